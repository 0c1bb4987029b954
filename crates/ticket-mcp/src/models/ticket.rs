//! Backend ticket payload shapes.
//!
//! Deserialization is deliberately lenient: every field is optional or
//! defaulted, unknown fields are ignored, and the listing endpoint may return
//! either a `{"tickets": [...]}` wrapper or a bare array.

use serde::Deserialize;

/// Ticket listing response, in either of the two shapes the backend emits.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TicketListPayload {
    /// `{"tickets": [...]}` wrapper.
    Wrapped { tickets: Vec<TicketSummary> },
    /// Bare top-level array.
    Bare(Vec<TicketSummary>),
}

impl TicketListPayload {
    /// Unwrap into the ticket list.
    #[must_use]
    pub fn into_tickets(self) -> Vec<TicketSummary> {
        match self {
            Self::Wrapped { tickets } | Self::Bare(tickets) => tickets,
        }
    }
}

/// One ticket row from the listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketSummary {
    /// Ticket ID; the backend sends strings or numbers depending on version.
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status_name: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
}

impl TicketSummary {
    /// Ticket ID rendered as a string.
    #[must_use]
    pub fn id_string(&self) -> String {
        id_to_string(&self.id)
    }
}

/// Ticket detail response: `{"ticket": {...}}` wrapper or a flat object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TicketDetailPayload {
    Wrapped { ticket: TicketDetail },
    Flat(TicketDetail),
}

impl TicketDetailPayload {
    /// Unwrap into the ticket detail record.
    #[must_use]
    pub fn into_detail(self) -> TicketDetail {
        match self {
            Self::Wrapped { ticket } | Self::Flat(ticket) => ticket,
        }
    }
}

/// Full ticket record from the detail endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketDetail {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub status_name: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub person_in_charge_name: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl TicketDetail {
    /// Ticket ID rendered as a string, falling back to the requested ID.
    #[must_use]
    pub fn id_string_or(&self, fallback: &str) -> String {
        let rendered = id_to_string(&self.id);
        if rendered.is_empty() { fallback.to_string() } else { rendered }
    }

    /// True when the backend sent no ticket data at all.
    ///
    /// The backend reports not-found as a 200 whose `ticket` is null, absent,
    /// or an empty object; every field then deserializes to its default.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_null()
            && self.title.is_none()
            && self.description.is_none()
            && self.history.is_empty()
            && self.status_name.is_none()
            && self.category_name.is_none()
            && self.account_name.is_none()
            && self.person_in_charge_name.is_none()
            && self.priority.is_none()
            && self.created_at.is_none()
            && self.updated_at.is_none()
    }
}

/// One ticket history entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub user_name: String,
}

fn id_to_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_wrapped_shape() {
        let payload: TicketListPayload =
            serde_json::from_value(json!({"tickets": [{"id": "T1", "title": "Login error"}]}))
                .unwrap();
        let tickets = payload.into_tickets();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].id_string(), "T1");
        assert_eq!(tickets[0].title, "Login error");
    }

    #[test]
    fn test_list_bare_shape() {
        let payload: TicketListPayload =
            serde_json::from_value(json!([{"id": 7, "title": "Crash"}])).unwrap();
        let tickets = payload.into_tickets();
        assert_eq!(tickets[0].id_string(), "7");
    }

    #[test]
    fn test_list_unknown_fields_ignored() {
        let payload: TicketListPayload = serde_json::from_value(
            json!({"tickets": [{"id": "T1", "title": "x", "assignee_badge": "gold"}]}),
        )
        .unwrap();
        assert_eq!(payload.into_tickets().len(), 1);
    }

    #[test]
    fn test_detail_wrapped_and_flat() {
        let wrapped: TicketDetailPayload =
            serde_json::from_value(json!({"ticket": {"id": "T2", "title": "Slow search"}}))
                .unwrap();
        assert_eq!(wrapped.into_detail().id_string_or("x"), "T2");

        let flat: TicketDetailPayload =
            serde_json::from_value(json!({"id": "T3", "description": "d"})).unwrap();
        assert_eq!(flat.into_detail().id_string_or("x"), "T3");
    }

    #[test]
    fn test_detail_id_fallback() {
        let detail = TicketDetail::default();
        assert_eq!(detail.id_string_or("REQ-9"), "REQ-9");
    }

    #[test]
    fn test_detail_null_or_empty_ticket_is_detected_as_empty() {
        // A null, absent, or `{}` ticket parses into an all-default detail;
        // `is_empty` is how the fetch tool turns that into a not-found error.
        for payload in [json!({"ticket": null}), json!({}), json!({"ticket": {}})] {
            let parsed: TicketDetailPayload = serde_json::from_value(payload).unwrap();
            assert!(parsed.into_detail().is_empty());
        }
    }

    #[test]
    fn test_detail_with_any_field_is_not_empty() {
        let parsed: TicketDetailPayload =
            serde_json::from_value(json!({"ticket": {"title": "Broken login"}})).unwrap();
        assert!(!parsed.into_detail().is_empty());
    }
}
