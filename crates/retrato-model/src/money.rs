// SPDX-License-Identifier: Apache-2.0

/// Renders cents as a Brazilian real amount (`R$ 199,00`). Comma decimal
/// separator, no thousands grouping.
#[must_use]
pub fn format_brl(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}R$ {},{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::format_brl;

    #[test]
    fn formats_whole_and_fractional_amounts() {
        assert_eq!(format_brl(2900), "R$ 29,00");
        assert_eq!(format_brl(19900), "R$ 199,00");
        assert_eq!(format_brl(105), "R$ 1,05");
        assert_eq!(format_brl(0), "R$ 0,00");
    }

    #[test]
    fn negative_amounts_keep_the_sign_outside() {
        assert_eq!(format_brl(-2900), "-R$ 29,00");
    }
}
