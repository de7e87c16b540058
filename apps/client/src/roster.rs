use std::fmt;

use geoshare_common::{ConnectionId, RosterEntry};

/// One row of the "who is online" list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterItem {
    pub id: ConnectionId,
    pub name: String,
    pub is_self: bool,
    /// Whether a position is known, i.e. whether focusing it does anything.
    pub has_position: bool,
}

impl fmt::Display for RosterItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.has_position { '*' } else { ' ' };
        write!(f, "{marker} {}", self.name)?;
        if self.is_self {
            f.write_str(" (you)")?;
        }
        Ok(())
    }
}

/// The roster as shown to the user: local identity first, then server order.
#[derive(Debug, Clone, Default)]
pub struct RosterView {
    items: Vec<RosterItem>,
}

impl RosterView {
    /// Replace the list with a fresh snapshot.
    pub fn rebuild(
        &mut self,
        entries: &[RosterEntry],
        local: Option<&ConnectionId>,
        has_position: impl Fn(&ConnectionId) -> bool,
    ) {
        let mut items: Vec<RosterItem> = entries
            .iter()
            .map(|entry| RosterItem {
                id: entry.id.clone(),
                name: entry.name.clone(),
                is_self: local == Some(&entry.id),
                has_position: has_position(&entry.id),
            })
            .collect();
        // Stable, so peers keep server order.
        items.sort_by_key(|item| !item.is_self);
        self.items = items;
    }

    pub fn mark_positioned(&mut self, id: &ConnectionId) {
        if let Some(item) = self.items.iter_mut().find(|item| &item.id == id) {
            item.has_position = true;
        }
    }

    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.id != id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Look up by exact identity, then by case-insensitive display name.
    pub fn find(&self, query: &str) -> Option<&RosterItem> {
        let query = query.trim();
        self.items
            .iter()
            .find(|item| item.id.as_str() == query)
            .or_else(|| {
                self.items
                    .iter()
                    .find(|item| item.name.eq_ignore_ascii_case(query))
            })
    }

    pub fn items(&self) -> &[RosterItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str) -> RosterEntry {
        RosterEntry {
            id: id.into(),
            name: name.into(),
        }
    }

    #[test]
    fn local_identity_is_listed_first() {
        let mut view = RosterView::default();
        let me = ConnectionId::from("conn_b");
        view.rebuild(
            &[entry("conn_a", "Amy"), entry("conn_b", "Bo"), entry("conn_c", "Cy")],
            Some(&me),
            |_| false,
        );

        let names: Vec<_> = view.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Bo", "Amy", "Cy"]);
        assert!(view.items()[0].is_self);
        assert!(!view.items()[1].is_self);
    }

    #[test]
    fn find_matches_identity_or_name() {
        let mut view = RosterView::default();
        view.rebuild(&[entry("conn_a", "Amy")], None, |_| true);

        assert_eq!(view.find("conn_a").map(|i| i.name.as_str()), Some("Amy"));
        assert_eq!(view.find(" amy ").map(|i| i.id.as_str()), Some("conn_a"));
        assert!(view.find("Bo").is_none());
    }

    fn lines(view: &RosterView) -> Vec<String> {
        view.items().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn lines_flag_position_and_self() {
        let mut view = RosterView::default();
        let me = ConnectionId::from("conn_a");
        view.rebuild(&[entry("conn_a", "Amy"), entry("conn_b", "Bo")], Some(&me), |id| {
            id.as_str() == "conn_a"
        });
        assert_eq!(lines(&view), ["* Amy (you)", "  Bo"]);

        view.mark_positioned(&ConnectionId::from("conn_b"));
        assert_eq!(lines(&view)[1], "* Bo");

        assert!(view.remove(&ConnectionId::from("conn_b")));
        assert!(!view.remove(&ConnectionId::from("conn_b")));
        assert_eq!(view.len(), 1);
    }
}
