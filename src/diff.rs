use std::collections::HashMap;

use crate::types::*;

fn diff_status(previous: &Status, current: &Status, events: &mut Vec<Event>) {
    for field in Status::FIELDS {
        let old = previous.get(field).unwrap_or_default();
        let new = current.get(field).unwrap_or_default();
        if old != new {
            events.push(Event::StatusChanged {
                field,
                old: old.to_string(),
                new: new.to_string(),
            });
        }
    }

    let zones = current.active_zones();
    if previous.active_zones() != zones {
        events.push(Event::ArmingChanged { zones });
    }
}

fn diff_elements(previous: &[Element], current: &[Element], events: &mut Vec<Event>) {
    let by_code: HashMap<&str, &Element> = previous.iter().map(|e| (e.code.as_str(), e)).collect();

    for element in current {
        let Some(old) = by_code.get(element.code.as_str()) else {
            events.push(Event::ElementAdded {
                code: element.code.clone(),
                name: element.name.clone(),
            });
            continue;
        };
        for flag in ElementFlag::ALL {
            if old.flag(flag) != element.flag(flag) {
                events.push(Event::ElementFlagChanged {
                    code: element.code.clone(),
                    name: element.name.clone(),
                    flag,
                    old: old.flag(flag).to_string(),
                    new: element.flag(flag).to_string(),
                });
            }
        }
    }

    for old in previous {
        if !current.iter().any(|e| e.code == old.code) {
            events.push(Event::ElementRemoved {
                code: old.code.clone(),
                name: old.name.clone(),
            });
        }
    }
}

/// Events between two refreshes. The first refresh is diffed against an
/// empty status and element list.
pub(crate) fn diff_snapshots(previous: Option<&Snapshot>, current: &Snapshot) -> Vec<Event> {
    let empty = Status::blank();
    let (prev_status, prev_elements) = match previous {
        Some(s) => (&s.status, s.elements.as_slice()),
        None => (&empty, &[][..]),
    };

    let mut events = Vec::new();
    diff_status(prev_status, &current.status, &mut events);
    diff_elements(prev_elements, &current.elements, &mut events);
    events
}
