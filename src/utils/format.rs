/// Format a score with exactly 2 decimal places, the only precision
/// scores are ever rendered or exported with.
pub fn format_nota(valor: f64) -> String {
    format!("{:.2}", valor)
}

/// Format a percentage with 2 decimal places and the `%` sign.
pub fn format_porcentaje(valor: f64) -> String {
    format!("{:.2}%", valor)
}

/// Approval verdict label for tables and exports.
pub fn estado_label(aprobado: bool) -> &'static str {
    if aprobado {
        "Aprobado"
    } else {
        "Reprobado"
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    value.as_deref().unwrap_or(default).to_string()
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_nota_two_decimals() {
        assert_eq!(format_nota(82.0), "82.00");
        assert_eq!(format_nota(50.5), "50.50");
        assert_eq!(format_nota(66.666), "66.67");
    }

    #[test]
    fn test_estado_label() {
        assert_eq!(estado_label(true), "Aprobado");
        assert_eq!(estado_label(false), "Reprobado");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hola", 10), "Hola");
        assert_eq!(truncate_string("Trigonometría aplicada", 10), "Trigono...");
        assert_eq!(truncate_string("Ña", 2), "Ña");
    }

    #[test]
    fn test_format_optional() {
        assert_eq!(format_optional(&Some("texto".to_string()), "-"), "texto");
        assert_eq!(format_optional(&None, "-"), "-");
    }
}
