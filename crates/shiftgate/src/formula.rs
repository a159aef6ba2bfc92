//! Filter formulas for list queries.
//!
//! The backend filters with a spreadsheet-like formula language. Values are
//! never spliced into formula text directly: every string goes through
//! [`quote`], and field names through [`field_ref`], so an operator named
//! `O'Brien` yields a valid formula instead of a broken query.

use std::fmt;

use chrono::NaiveDate;

/// A backend filter formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula(String);

impl Formula {
    /// Wrap formula text that was written by hand.
    ///
    /// Only for fixed expressions; use the builders for anything that
    /// contains user data.
    #[must_use]
    pub fn raw(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// `{field} = 'value'`
    #[must_use]
    pub fn eq(field: &str, value: &str) -> Self {
        Self(format!("{} = {}", field_ref(field), quote(value)))
    }

    /// Case-insensitive equality: `LOWER({field}) = 'value'`.
    #[must_use]
    pub fn eq_ignore_case(field: &str, value: &str) -> Self {
        Self(format!(
            "LOWER({}) = {}",
            field_ref(field),
            quote(&value.to_lowercase())
        ))
    }

    /// A checkbox field is ticked.
    #[must_use]
    pub fn is_true(field: &str) -> Self {
        Self(format!("{} = 1", field_ref(field)))
    }

    /// The date part of a date-time field equals `date`.
    #[must_use]
    pub fn on_date(field: &str, date: NaiveDate) -> Self {
        Self(format!(
            "DATETIME_FORMAT({}, 'YYYY-MM-DD') = {}",
            field_ref(field),
            quote(&date.format("%Y-%m-%d").to_string())
        ))
    }

    /// The date part of a date-time field lies in `[from, to]`.
    #[must_use]
    pub fn date_between(field: &str, from: NaiveDate, to: NaiveDate) -> Self {
        let day = format!("DATETIME_FORMAT({}, 'YYYY-MM-DD')", field_ref(field));
        Self::and([
            Self(format!(
                "{day} >= {}",
                quote(&from.format("%Y-%m-%d").to_string())
            )),
            Self(format!(
                "{day} <= {}",
                quote(&to.format("%Y-%m-%d").to_string())
            )),
        ])
    }

    /// Conjunction. A single operand is returned unwrapped.
    #[must_use]
    pub fn and(parts: impl IntoIterator<Item = Formula>) -> Self {
        Self::combine("AND", parts)
    }

    /// Disjunction. A single operand is returned unwrapped.
    #[must_use]
    pub fn or(parts: impl IntoIterator<Item = Formula>) -> Self {
        Self::combine("OR", parts)
    }

    fn combine(function: &str, parts: impl IntoIterator<Item = Formula>) -> Self {
        let mut parts: Vec<Formula> = parts.into_iter().collect();
        match parts.len() {
            // Empty AND/OR is not valid formula syntax; TRUE()/FALSE() keeps the identity
            0 if function == "AND" => Self::raw("TRUE()"),
            0 => Self::raw("FALSE()"),
            1 => parts.remove(0),
            _ => {
                let joined = parts
                    .iter()
                    .map(Formula::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                Self(format!("{function}({joined})"))
            }
        }
    }

    /// Formula text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quote a string literal for use inside a formula.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// Reference a field by name: `{Field Name}`.
#[must_use]
pub fn field_ref(name: &str) -> String {
    format!("{{{}}}", name.replace('}', "\\}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq() {
        let f = Formula::eq("Estado", "En_Proceso");
        assert_eq!(f.as_str(), "{Estado} = 'En_Proceso'");
    }

    #[test]
    fn test_eq_escapes_quotes() {
        let f = Formula::eq("Operador", "O'Brien");
        assert_eq!(f.as_str(), r"{Operador} = 'O\'Brien'");
    }

    #[test]
    fn test_quote_escapes_backslash_before_quote() {
        // A trailing backslash must not escape the closing quote
        assert_eq!(quote(r"abc\"), r"'abc\\'");
        assert_eq!(quote(r"a\'b"), r"'a\\\'b'");
    }

    #[test]
    fn test_injection_attempt_stays_inside_literal() {
        let f = Formula::eq("Cedula", "1' , TRUE()) OR ('1");
        assert_eq!(f.as_str(), r"{Cedula} = '1\' , TRUE()) OR (\'1'");
    }

    #[test]
    fn test_eq_ignore_case() {
        let f = Formula::eq_ignore_case("Operador", "ANA María");
        assert_eq!(f.as_str(), "LOWER({Operador}) = 'ana maría'");
    }

    #[test]
    fn test_is_true() {
        assert_eq!(Formula::is_true("Activo").as_str(), "{Activo} = 1");
    }

    #[test]
    fn test_on_date() {
        let date = NaiveDate::from_ymd_opt(2025, 4, 26).unwrap();
        let f = Formula::on_date("Fecha Inicio Turno", date);
        assert_eq!(
            f.as_str(),
            "DATETIME_FORMAT({Fecha Inicio Turno}, 'YYYY-MM-DD') = '2025-04-26'"
        );
    }

    #[test]
    fn test_date_between() {
        let from = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 4, 30).unwrap();
        let f = Formula::date_between("Fecha", from, to);
        assert!(f.as_str().starts_with("AND("));
        assert!(f.as_str().contains(">= '2025-04-01'"));
        assert!(f.as_str().contains("<= '2025-04-30'"));
    }

    #[test]
    fn test_and_or_shapes() {
        let a = Formula::eq("a", "1");
        let b = Formula::eq("b", "2");

        assert_eq!(
            Formula::and([a.clone(), b.clone()]).as_str(),
            "AND({a} = '1', {b} = '2')"
        );
        assert_eq!(
            Formula::or([a.clone(), b]).as_str(),
            "OR({a} = '1', {b} = '2')"
        );
        assert_eq!(Formula::and([a.clone()]), a);
        assert_eq!(Formula::and(Vec::new()).as_str(), "TRUE()");
        assert_eq!(Formula::or(Vec::new()).as_str(), "FALSE()");
    }

    #[test]
    fn test_field_ref_escapes_brace() {
        assert_eq!(field_ref("odd}name"), r"{odd\}name}");
    }

    #[test]
    fn test_display() {
        let f = Formula::is_true("Activo");
        assert_eq!(f.to_string(), "{Activo} = 1");
    }
}
