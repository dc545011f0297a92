//! Pure parsers for the panel's pages.

use quick_xml::Reader;
use quick_xml::events::Event as XmlEvent;
use scraper::{Html, Selector};
use tracing::debug;

use crate::text::{filter_ascii, fix_mojibake};
use crate::types::{ChallengeTable, Element, Status};
use crate::{Error, Result};

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Error::Parse(format!("invalid selector {selector:?}: {e}")))
}

/// Whitespace-normalized text of the first element matching `selector`.
pub(crate) fn select_text(html: &str, selector: &str) -> Result<Option<String>> {
    let selector = compile(selector)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")))
}

/// Charset named by a `<meta http-equiv="content-type">` tag.
pub(crate) fn declared_charset(html: &str, selector: &str) -> Result<Option<String>> {
    let selector = compile(selector)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .find_map(|content| {
            content
                .split(';')
                .filter_map(|part| part.trim().split_once('='))
                .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
                .map(|(_, value)| value.trim().to_string())
        }))
}

fn assign(status: &mut Status, tag: &str, raw: &str) {
    let value = filter_ascii(raw);
    let field = match tag {
        "defaut0" => &mut status.battery,
        "defaut1" => &mut status.radio,
        "defaut2" => &mut status.door,
        "defaut3" => &mut status.alarm,
        "defaut4" => &mut status.panel,
        "zone0" => &mut status.zone_a,
        "zone1" => &mut status.zone_b,
        "zone2" => &mut status.zone_c,
        "gsm" => &mut status.gsm,
        "recgsm" => &mut status.gsm_signal,
        "opegsm" => &mut status.gsm_operator,
        "camera" => &mut status.camera,
        _ => return,
    };
    *field = value;
}

/// Parses `status.xml`: children of the root element map to status fields by
/// tag name; unknown tags are ignored.
pub fn parse_status(xml: &str) -> Result<Status> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut status = Status::default();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut current: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            XmlEvent::Start(e) => {
                depth += 1;
                seen_root = true;
                if depth == 2 {
                    current = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                    text.clear();
                }
            }
            XmlEvent::Empty(e) => {
                seen_root = true;
                if depth == 1 {
                    assign(&mut status, &String::from_utf8_lossy(e.local_name().as_ref()), "");
                }
            }
            XmlEvent::Text(t) if depth == 2 => text.push_str(&t.unescape()?),
            XmlEvent::CData(c) if depth == 2 => text.push_str(&String::from_utf8_lossy(&c)),
            XmlEvent::End(_) => {
                if depth == 2
                    && let Some(tag) = current.take()
                {
                    assign(&mut status, &tag, &text);
                }
                depth = depth.saturating_sub(1);
            }
            XmlEvent::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(Error::Parse("empty status document".to_string()));
    }
    debug!(%status, "parsed status");
    Ok(status)
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
        i += 1;
    }
    i
}

fn split_items(body: &str) -> Vec<String> {
    if body.trim().is_empty() {
        return Vec::new();
    }
    body.split(',')
        .map(|item| item.trim().trim_matches('"').trim_matches('\'').to_string())
        .collect()
}

/// Items of `var <name> = [ ... ];`, matched case-insensitively. Empty when
/// the array is absent.
pub(crate) fn extract_array(page: &str, name: &str) -> Vec<String> {
    let lower = page.to_ascii_lowercase();
    let name = name.to_ascii_lowercase();
    let bytes = lower.as_bytes();

    let mut from = 0;
    while let Some(pos) = lower[from..].find("var") {
        let start = from + pos + 3;
        from = start;

        let i = skip_ws(bytes, start);
        if i == start || !lower[i..].starts_with(&name) {
            continue;
        }
        let i = skip_ws(bytes, i + name.len());
        if bytes.get(i) != Some(&b'=') {
            continue;
        }
        let i = skip_ws(bytes, i + 1);
        if bytes.get(i) != Some(&b'[') {
            continue;
        }
        let body_start = i + 1;
        return match lower[body_start..].find("];") {
            Some(len) => split_items(&page[body_start..body_start + len]),
            None => Vec::new(),
        };
    }
    Vec::new()
}

/// Parses the JS arrays of the elements page. The element count is the
/// shortest of the label, name and code arrays; other arrays pad with "".
pub fn parse_elements(page: &str) -> Vec<Element> {
    let labels = extract_array(page, "item_label");
    let names = extract_array(page, "elt_name");
    let codes = extract_array(page, "elt_code");
    let battery = extract_array(page, "elt_pile");
    let comm = extract_array(page, "elt_onde");
    let door = extract_array(page, "elt_porte");
    let zone = extract_array(page, "elt_zone");
    let tamper = extract_array(page, "elt_as");
    let house = extract_array(page, "elt_maison");
    let pause = extract_array(page, "item_pause");

    let at = |values: &[String], i: usize| values.get(i).cloned().unwrap_or_default();

    let count = labels.len().min(names.len()).min(codes.len());
    (0..count)
        .map(|i| Element {
            code: codes[i].clone(),
            label: fix_mojibake(&labels[i]).into_owned(),
            name: fix_mojibake(&names[i]).into_owned(),
            zone: fix_mojibake(&at(&zone, i)).into_owned(),
            battery: at(&battery, i),
            comm: comm.get(i).cloned().unwrap_or_else(|| "itemhidden".to_string()),
            house: at(&house, i),
            tamper: at(&tamper, i),
            door: at(&door, i),
            pause: at(&pause, i),
        })
        .collect()
}

/// Reads the 6x5 authentication card in row-major order into A1..F5.
pub fn parse_challenge_card(html: &str, selector: &str) -> Result<ChallengeTable> {
    let selector = compile(selector)?;
    let document = Html::parse_document(html);
    let cells: Vec<String> = document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect();

    if cells.len() < ChallengeTable::CELLS {
        return Err(Error::Parse(format!(
            "challenge card has {} cells, expected {}",
            cells.len(),
            ChallengeTable::CELLS
        )));
    }

    let columns = ChallengeTable::COLUMNS;
    Ok(cells
        .into_iter()
        .take(ChallengeTable::CELLS)
        .enumerate()
        .map(|(i, code)| {
            let coordinate = format!("{}{}", columns[i % columns.len()], i / columns.len() + 1);
            (coordinate, code)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{PROTEXIAL, Selector as Kind};

    #[test]
    fn status_fields_are_folded() {
        let xml = "<?xml version=\"1.0\"?><response><defaut0>OK</defaut0><zone0>ON</zone0></response>";
        let status = parse_status(xml).unwrap();
        assert_eq!(status.battery, "ok");
        assert_eq!(status.zone_a, "on");
        assert_eq!(status.zone_b, "off");
    }

    #[test]
    fn status_missing_tags_keep_healthy_defaults() {
        let status = parse_status("<response><zone0>on</zone0><zone2/></response>").unwrap();
        assert_eq!(status.zone_a, "on");
        assert_eq!(status.zone_c, "");
        assert_eq!(status.battery, "ok");
        assert_eq!(status.panel, "ok");
        assert_eq!(status.gsm, "gsm connect au rseau");
        assert_eq!(status.gsm_signal, "4");
        assert_eq!(status.gsm_operator, "orange");
        assert_eq!(status.camera, "disabled");
    }

    #[test]
    fn status_full_document() {
        let xml = r#"<response>
            <defaut0>ok</defaut0><defaut1>ok</defaut1><defaut2>nok</defaut2>
            <defaut3>ok</defaut3><defaut4>ok</defaut4>
            <zone0>off</zone0><zone1>on</zone1><zone2>off</zone2>
            <gsm>GSM connecté au réseau</gsm><recgsm>4</recgsm>
            <opegsm>"Orange"</opegsm><camera>disabled</camera>
            <unknown>ignored</unknown><empty/>
        </response>"#;
        let status = parse_status(xml).unwrap();
        assert_eq!(status.door, "nok");
        assert_eq!(status.zone_b, "on");
        assert_eq!(status.gsm, "gsm connect au rseau");
        assert_eq!(status.gsm_signal, "4");
        assert_eq!(status.gsm_operator, "\"orange\"");
        assert_eq!(status.camera, "disabled");
    }

    #[test]
    fn status_non_ascii_only_value_is_empty() {
        let status = parse_status("<r><opegsm>éàü</opegsm></r>").unwrap();
        assert_eq!(status.gsm_operator, "");
    }

    #[test]
    fn status_malformed_is_error() {
        assert!(matches!(parse_status("<r><zone0>on</zone1></r>"), Err(Error::Parse(_))));
        assert!(matches!(parse_status(""), Err(Error::Parse(_))));
    }

    #[test]
    fn elements_with_missing_arrays() {
        let page = r#"<script>
            var item_label = ["DO","DM"];
            var elt_name = ["Porte","Detecteur"];
            var elt_code=["1","2"];
        </script>"#;
        let elements = parse_elements(page);
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].label, "DO");
        assert_eq!(elements[0].name, "Porte");
        assert_eq!(elements[0].code, "1");
        assert_eq!(elements[1].label, "DM");
        assert_eq!(elements[1].name, "Detecteur");
        assert_eq!(elements[1].battery, "");
        assert_eq!(elements[1].zone, "");
        assert_eq!(elements[1].pause, "");
    }

    #[test]
    fn elements_count_is_shortest_mandatory_array() {
        let page = r#"
            VAR item_label = ['DO', 'DM', 'Clavier'];
            var elt_name = ["TÃ©lÃ©commande", "Salon", "Entrée"];
            var elt_code = ["11", "12"];
            var elt_pile = ["itembattok", "itembattnok", "itembattok"];
            var elt_onde = ["itemcomok"];
            var elt_zone = ["A (f)", "SYS"];
            var item_pause = ["running", "itempause"];
        "#;
        let elements = parse_elements(page);
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].name, "Télécommande");
        assert_eq!(elements[0].comm, "itemcomok");
        assert_eq!(elements[1].comm, "itemhidden");
        assert_eq!(elements[1].battery, "itembattnok");
        assert_eq!(elements[1].zone, "SYS");
        assert!(elements[1].is_paused());
    }

    #[test]
    fn empty_array_has_no_items() {
        assert!(extract_array("var elt_code = [];", "elt_code").is_empty());
        assert!(extract_array("var elt_code_x = [\"1\"];", "elt_code").is_empty());
        assert_eq!(extract_array("var  elt_code\n=\n[ \"7\" ];", "elt_code"), vec!["7"]);
    }

    #[test]
    fn page_without_arrays_has_no_elements() {
        assert!(parse_elements("<html><body>Erreur</body></html>").is_empty());
    }

    fn card_html(cells: usize) -> String {
        let mut html = String::from(
            "<table class=\"table_authentication\"><tr><th></th><th>A</th><th>B</th><th>C</th><th>D</th><th>E</th><th>F</th></tr>",
        );
        for row in 0..5 {
            html.push_str(&format!("<tr><td>{}</td>", row + 1));
            for col in 0..6 {
                let i = row * 6 + col;
                if i < cells {
                    html.push_str(&format!("<td> {:04} </td>", i));
                }
            }
            html.push_str("</tr>");
        }
        html.push_str("</table>");
        html
    }

    #[test]
    fn challenge_card_row_major() {
        let table = parse_challenge_card(&card_html(30), PROTEXIAL.selector(Kind::ChallengeCard)).unwrap();
        assert_eq!(table.len(), 30);
        assert_eq!(table.lookup("A1").unwrap(), "0000");
        assert_eq!(table.lookup("F1").unwrap(), "0005");
        assert_eq!(table.lookup("A2").unwrap(), "0006");
        assert_eq!(table.lookup("F5").unwrap(), "0029");
    }

    #[test]
    fn challenge_card_incomplete() {
        let result = parse_challenge_card(&card_html(12), PROTEXIAL.selector(Kind::ChallengeCard));
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn select_text_normalizes_whitespace() {
        let html = "<div id=\"infobox\"><b>\n  (0x0902)\n</b></div>";
        assert_eq!(select_text(html, "#infobox b").unwrap().as_deref(), Some("(0x0902)"));
        assert_eq!(select_text(html, "#missing").unwrap(), None);
        assert!(select_text(html, "##").is_err());
    }

    #[test]
    fn charset_from_meta() {
        let html = r#"<html><head><meta http-equiv="content-type" content="text/html; charset=ISO-8859-1"></head></html>"#;
        let charset = declared_charset(html, PROTEXIAL.selector(Kind::ContentType)).unwrap();
        assert_eq!(charset.as_deref(), Some("ISO-8859-1"));
    }
}
