//! Statement builders for the provisioning primitives.
//!
//! Role and database DDL cannot take bind parameters, so every identifier and
//! literal coming from a declared object is quoted here before it reaches the
//! cluster.

pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quotes a string literal so it is read back verbatim whatever the value of
/// `standard_conforming_strings`.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    if escaped.contains('\\') {
        format!("E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{escaped}'")
    }
}

pub fn create_user(username: &str, password: &str) -> String {
    format!(
        "CREATE USER {} WITH PASSWORD {}",
        quote_identifier(username),
        quote_literal(password)
    )
}

pub fn create_database(name: &str, owner: &str) -> String {
    format!(
        "CREATE DATABASE {} WITH OWNER {}",
        quote_identifier(name),
        quote_identifier(owner)
    )
}

pub fn drop_database(name: &str) -> String {
    format!("DROP DATABASE IF EXISTS {}", quote_identifier(name))
}

pub fn drop_user(username: &str) -> String {
    format!("DROP USER IF EXISTS {}", quote_identifier(username))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_are_double_quoted() {
        assert_eq!(quote_identifier("orders"), "\"orders\"");
        assert_eq!(quote_identifier("Orders \"EU\""), "\"Orders \"\"EU\"\"\"");
    }

    #[test]
    fn test_literals_escape_quotes_and_backslashes() {
        assert_eq!(quote_literal("s3cr3t"), "'s3cr3t'");
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal(r"a\b'c"), r"E'a\\b''c'");
    }

    #[test]
    fn test_create_statements() {
        assert_eq!(
            create_user("orders_app", "s3cr3t"),
            "CREATE USER \"orders_app\" WITH PASSWORD 's3cr3t'"
        );
        assert_eq!(
            create_database("orders", "orders_app"),
            "CREATE DATABASE \"orders\" WITH OWNER \"orders_app\""
        );
    }

    #[test]
    fn test_drop_statements_tolerate_absence() {
        assert_eq!(drop_database("orders"), "DROP DATABASE IF EXISTS \"orders\"");
        assert_eq!(drop_user("orders_app"), "DROP USER IF EXISTS \"orders_app\"");
    }

    #[test]
    fn test_injection_attempts_stay_inside_quotes() {
        let statement = create_user("x\"; DROP DATABASE postgres; --", "'; DROP ROLE admin; --");

        assert_eq!(
            statement,
            "CREATE USER \"x\"\"; DROP DATABASE postgres; --\" WITH PASSWORD '''; DROP ROLE admin; --'"
        );
    }
}
