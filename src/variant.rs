//! Per-firmware knowledge: page paths, selectors, form payloads and charset.
//! The three profiles differ only in data.

use crate::text::encoding_for;
use crate::types::{ApiVariant, Zone};

/// Error codes as the panel prints them on its error page.
pub const WRONG_CODE: &str = "(0x0B00)";
pub const MAX_LOGIN_ATTEMPTS: &str = "(0x0904)";
pub const WRONG_CREDENTIALS: &str = "(0x0812)";
pub const SESSION_ALREADY_OPEN: &str = "(0x0902)";
pub const NOT_AUTHORIZED: &str = "(0x0903)";
pub const UNKNOWN_PARAMETER: &str = "(0x1003)";

/// Element list pages, tried in this order on every variant.
pub const ELEMENT_PAGES: [&str; 3] = ["/fr/u_plistelmt.htm", "/fr/u_listelmt.htm", "/fr/p_ulistelem.htm"];

/// Ordered `application/x-www-form-urlencoded` fields.
pub type Form = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Login,
    Logout,
    Pilotage,
    Status,
    Error,
    ChallengeCard,
    Version,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    ContentType,
    LoginChallenge,
    ErrorCode,
    Footer,
    ChallengeCard,
}

#[derive(Debug)]
struct Pages {
    login: &'static str,
    logout: &'static str,
    pilotage: &'static str,
    status: &'static str,
    error: &'static str,
    challenge_card: &'static str,
    version: Option<&'static str>,
    default: &'static str,
}

#[derive(Debug)]
struct Selectors {
    content_type: &'static str,
    login_challenge: &'static str,
    error_code: &'static str,
    footer: &'static str,
    challenge_card: &'static str,
}

#[derive(Debug)]
enum ArmForm {
    /// `btn_zone_on_A=Marche A`; `verbose` adds the zone letters to the value.
    Buttons { verbose: bool },
    /// A single `zone=Marche A` field.
    ZoneField,
}

#[derive(Debug)]
pub struct Variant {
    pub api: ApiVariant,
    pages: Pages,
    selectors: Selectors,
    login_submit: (&'static str, &'static str),
    arm_form: ArmForm,
    encoding: &'static str,
}

pub static PROTEXIAL_IO: Variant = Variant {
    api: ApiVariant::ProtexialIo,
    pages: Pages {
        login: "/m_login.htm",
        logout: "/m_logout.htm",
        pilotage: "/mu_pilotage.htm",
        status: "/status.xml",
        error: "/m_error.htm",
        challenge_card: "/mu_print.htm",
        version: Some("/cfg/vers"),
        default: "/m_default.htm",
    },
    selectors: Selectors {
        content_type: "meta[http-equiv='Content-Type']",
        login_challenge: "#challenge b",
        error_code: "#error_code",
        footer: "#footer",
        challenge_card: "table.card td.code",
    },
    login_submit: ("action", "Connexion"),
    arm_form: ArmForm::Buttons { verbose: false },
    encoding: "utf-8",
};

pub static PROTEXIAL: Variant = Variant {
    api: ApiVariant::Protexial,
    pages: Pages {
        login: "/fr/login.htm",
        logout: "/logout.htm",
        pilotage: "/fr/u_pilotage.htm",
        status: "/status.xml",
        error: "/fr/error.htm",
        challenge_card: "/fr/u_print.htm",
        version: None,
        default: "/default.htm",
    },
    selectors: Selectors {
        content_type: "meta[http-equiv='content-type']",
        login_challenge: "#form_id table tr td b",
        error_code: "#infobox b",
        footer: "[id^='menu_footer']",
        challenge_card: "table.table_authentication td:not(:first-child)",
    },
    login_submit: ("btn_login", "Connexion"),
    arm_form: ArmForm::Buttons { verbose: true },
    encoding: "windows-1252",
};

pub static PROTEXIOM: Variant = Variant {
    api: ApiVariant::Protexiom,
    pages: Pages {
        login: "/login.htm",
        logout: "/logout.htm",
        pilotage: "/u_pilotage.htm",
        status: "/status.xml",
        error: "/error.htm",
        challenge_card: "/u_print.htm",
        version: None,
        default: "/default.htm",
    },
    selectors: Selectors {
        content_type: "meta[http-equiv='content-type']",
        login_challenge: "#form_id b",
        error_code: "#infobox",
        footer: "#footer",
        challenge_card: "#tab_auth td:not(:first-child)",
    },
    login_submit: ("action", "Valider"),
    arm_form: ArmForm::ZoneField,
    encoding: "iso-8859-15",
};

impl ApiVariant {
    pub fn profile(&self) -> &'static Variant {
        match self {
            ApiVariant::ProtexialIo => &PROTEXIAL_IO,
            ApiVariant::Protexial => &PROTEXIAL,
            ApiVariant::Protexiom => &PROTEXIOM,
        }
    }
}

fn form(fields: &[(&str, &str)]) -> Form {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// "A B C" for ABC, the letter otherwise.
fn spelled(zone: Zone) -> String {
    let letters = zone.as_panel_str();
    letters
        .chars()
        .map(String::from)
        .collect::<Vec<_>>()
        .join(" ")
}

impl Variant {
    /// `None` only for `Page::Version` on firmware without a version page.
    pub fn page(&self, page: Page) -> Option<&'static str> {
        let p = &self.pages;
        match page {
            Page::Login => Some(p.login),
            Page::Logout => Some(p.logout),
            Page::Pilotage => Some(p.pilotage),
            Page::Status => Some(p.status),
            Page::Error => Some(p.error),
            Page::ChallengeCard => Some(p.challenge_card),
            Page::Version => p.version,
            Page::Default => Some(p.default),
        }
    }

    pub fn selector(&self, selector: Selector) -> &'static str {
        let s = &self.selectors;
        match selector {
            Selector::ContentType => s.content_type,
            Selector::LoginChallenge => s.login_challenge,
            Selector::ErrorCode => s.error_code,
            Selector::Footer => s.footer,
            Selector::ChallengeCard => s.challenge_card,
        }
    }

    /// Charset label used for page bodies and form values.
    pub fn text_encoding(&self) -> &'static str {
        self.encoding
    }

    pub fn login_payload(&self, username: &str, password: &str, code: &str) -> Form {
        let (submit, value) = self.login_submit;
        form(&[
            ("login", username),
            ("password", password),
            ("key", code),
            (submit, value),
        ])
    }

    /// `None` for `Zone::None`, which cannot be armed.
    pub fn arm_payload(&self, zone: Zone) -> Option<Form> {
        if zone == Zone::None {
            return None;
        }
        let spelled = format!("Marche {}", spelled(zone));
        let fields = match self.arm_form {
            ArmForm::Buttons { verbose } => {
                let button = format!("btn_zone_on_{}", zone.as_panel_str());
                let value = if verbose { spelled } else { "Marche".to_string() };
                vec![("hidden".to_string(), "hidden".to_string()), (button, value)]
            }
            ArmForm::ZoneField => vec![
                ("hidden".to_string(), "hidden".to_string()),
                ("zone".to_string(), spelled),
            ],
        };
        Some(fields)
    }

    pub fn disarm_payload(&self) -> Form {
        match self.arm_form {
            ArmForm::Buttons { verbose: true } => {
                form(&[("hidden", "hidden"), ("btn_zone_off_ABC", "Arrêt A B C")])
            }
            ArmForm::Buttons { verbose: false } => {
                form(&[("hidden", "hidden"), ("btn_zone_off_ABC", "Arrêt")])
            }
            ArmForm::ZoneField => form(&[("hidden", "hidden"), ("zone", "Arrêt A B C")]),
        }
    }

    pub fn light_on_payload(&self) -> Form {
        form(&[("hidden", "hidden"), ("btn_lum_on", "ON")])
    }

    pub fn light_off_payload(&self) -> Form {
        form(&[("hidden", "hidden"), ("btn_lum_off", "OFF")])
    }

    pub fn open_cover_payload(&self) -> Form {
        form(&[("hidden", "hidden"), ("btn_vol_up", "")])
    }

    pub fn close_cover_payload(&self) -> Form {
        form(&[("hidden", "hidden"), ("btn_vol_down", "")])
    }

    pub fn stop_cover_payload(&self) -> Form {
        form(&[("hidden", "hidden"), ("btn_vol_stop", "")])
    }

    pub fn reset_session_payload(&self) -> Form {
        form(&[("btn_ok", "OK")])
    }

    /// URL-encodes a form with values converted to this variant's charset.
    pub fn encode_form(&self, fields: &Form) -> String {
        let encoding = encoding_for(self.encoding);
        fields
            .iter()
            .map(|(k, v)| {
                let (bytes, _, _) = encoding.encode(v);
                format!("{}={}", urlencoding::encode(k), urlencoding::encode_binary(&bytes))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value<'a>(form: &'a Form, key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn every_variant_resolves_mandatory_pages() {
        for api in ApiVariant::DETECTION_ORDER {
            let v = api.profile();
            assert_eq!(v.api, api);
            for page in [
                Page::Login,
                Page::Logout,
                Page::Pilotage,
                Page::Status,
                Page::Error,
                Page::ChallengeCard,
                Page::Default,
            ] {
                assert!(v.page(page).unwrap().starts_with('/'), "{api} {page:?}");
            }
        }
    }

    #[test]
    fn only_io_has_version_page() {
        assert_eq!(PROTEXIAL_IO.page(Page::Version), Some("/cfg/vers"));
        assert_eq!(PROTEXIAL.page(Page::Version), None);
        assert_eq!(PROTEXIOM.page(Page::Version), None);
    }

    #[test]
    fn login_pages_are_distinct() {
        let pages: Vec<_> = ApiVariant::DETECTION_ORDER
            .iter()
            .map(|a| a.profile().page(Page::Login))
            .collect();
        assert_ne!(pages[0], pages[1]);
        assert_ne!(pages[1], pages[2]);
        assert_ne!(pages[0], pages[2]);
    }

    #[test]
    fn arm_payloads() {
        let form = PROTEXIAL.arm_payload(Zone::Abc).unwrap();
        assert_eq!(value(&form, "btn_zone_on_ABC"), Some("Marche A B C"));

        let form = PROTEXIAL_IO.arm_payload(Zone::B).unwrap();
        assert_eq!(value(&form, "btn_zone_on_B"), Some("Marche"));

        let form = PROTEXIOM.arm_payload(Zone::C).unwrap();
        assert_eq!(value(&form, "zone"), Some("Marche C"));

        assert!(PROTEXIAL.arm_payload(Zone::None).is_none());
    }

    #[test]
    fn login_payload_fields() {
        let form = PROTEXIAL.login_payload("u", "secret", "1234");
        assert_eq!(value(&form, "login"), Some("u"));
        assert_eq!(value(&form, "password"), Some("secret"));
        assert_eq!(value(&form, "key"), Some("1234"));
        assert_eq!(value(&form, "btn_login"), Some("Connexion"));
    }

    #[test]
    fn form_values_use_variant_charset() {
        let disarm = PROTEXIAL.disarm_payload();
        assert_eq!(
            PROTEXIAL.encode_form(&disarm),
            "hidden=hidden&btn_zone_off_ABC=Arr%EAt%20A%20B%20C"
        );
        let disarm = PROTEXIAL_IO.disarm_payload();
        assert_eq!(
            PROTEXIAL_IO.encode_form(&disarm),
            "hidden=hidden&btn_zone_off_ABC=Arr%C3%AAt"
        );
    }
}
