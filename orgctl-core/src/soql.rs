//! Parameterized SOQL construction.
//!
//! Every query string sent to the org's query endpoint is assembled here,
//! with string literals passed through [`quote_literal`]. Callers never
//! interpolate raw input into a query.

/// Quote a string as a SOQL single-quoted literal, escaping backslashes
/// and embedded quotes.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Render values as a quoted IN-list body: `'a', 'b', 'c'`
pub fn in_list<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| quote_literal(v.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Record-type ids for a set of sobject types
pub fn record_types_query<S: AsRef<str>>(sobject_types: &[S]) -> String {
    format!(
        "SELECT Id, Name, SobjectType, DeveloperName FROM RecordType WHERE SobjectType IN ({})",
        in_list(sobject_types)
    )
}

/// Single user id by username
pub fn user_id_query(username: &str) -> String {
    format!(
        "SELECT Id FROM User WHERE Username = {} LIMIT 1",
        quote_literal(username)
    )
}

/// User ids for a set of usernames
pub fn user_ids_query<S: AsRef<str>>(usernames: &[S]) -> String {
    format!(
        "SELECT Id, Username FROM User WHERE Username IN ({})",
        in_list(usernames)
    )
}

/// Permission-set id by name or label
pub fn permission_set_query(name: &str) -> String {
    let quoted = quote_literal(name);
    format!(
        "SELECT Id FROM PermissionSet WHERE Name = {} OR Label = {} LIMIT 1",
        quoted, quoted
    )
}

/// Existing assignments of a permission set among the given usernames
pub fn permission_set_assignments_query<S: AsRef<str>>(
    permission_set_id: &str,
    usernames: &[S],
) -> String {
    format!(
        "SELECT Id, Assignee.Username FROM PermissionSetAssignment WHERE PermissionSetId = {} AND Assignee.Username IN ({})",
        quote_literal(permission_set_id),
        in_list(usernames)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_values() {
        assert_eq!(quote_literal("Developer"), "'Developer'");
    }

    #[test]
    fn escapes_embedded_quotes() {
        assert_eq!(quote_literal("O'Brien"), "'O\\'Brien'");
        assert_eq!(quote_literal("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn renders_in_list() {
        assert_eq!(
            in_list(&["test@example.com", "other@example.com"]),
            "'test@example.com', 'other@example.com'"
        );
    }

    #[test]
    fn user_query_is_parameterized() {
        let query = user_id_query("evil'; DROP--");
        assert!(query.contains("'evil\\'; DROP--'"));
    }

    #[test]
    fn permission_set_query_matches_name_or_label() {
        let query = permission_set_query("My Permission");
        assert_eq!(
            query,
            "SELECT Id FROM PermissionSet WHERE Name = 'My Permission' OR Label = 'My Permission' LIMIT 1"
        );
    }

    #[test]
    fn record_types_query_lists_sobjects() {
        let query = record_types_query(&["Account", "Contact"]);
        assert!(query.ends_with("WHERE SobjectType IN ('Account', 'Contact')"));
    }
}
