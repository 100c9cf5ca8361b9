//! Locale-aware date formatting with Unicode-style patterns such as
//! `d MMM y`.
//!
//! Supported fields are `d`/`dd` (day), `M`/`MM`/`MMM`/`MMMM` (month as a
//! number, abbreviated or wide name), `y`/`yy`/`yyyy` (year), `H`/`HH` and
//! `h`/`hh` (24- and 12-hour), `m`/`mm`, `s`/`ss` and `a` (day period).
//! Text between single quotes is copied as-is (`''` is a literal quote);
//! any other ASCII letter is rejected so typos in configured patterns
//! surface as errors instead of odd output.

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};

/// Month and day-period names for a locale.
#[derive(Debug)]
pub struct Locale {
    pub months_abbreviated: [&'static str; 12],
    pub months_wide: [&'static str; 12],
    pub day_periods: [&'static str; 2],
}

/// Brazilian Portuguese.
pub const PT_BR: Locale = Locale {
    months_abbreviated: [
        "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out",
        "nov", "dez",
    ],
    months_wide: [
        "janeiro",
        "fevereiro",
        "março",
        "abril",
        "maio",
        "junho",
        "julho",
        "agosto",
        "setembro",
        "outubro",
        "novembro",
        "dezembro",
    ],
    day_periods: ["AM", "PM"],
};

/// Formats timestamps for one locale in one fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct DateFormatter {
    locale: &'static Locale,
    offset: FixedOffset,
}

impl DateFormatter {
    pub fn new(locale: &'static Locale, offset: FixedOffset) -> DateFormatter {
        DateFormatter { locale, offset }
    }

    /// A pt-BR formatter that renders times in UTC.
    pub fn pt_br() -> DateFormatter {
        DateFormatter::new(&PT_BR, Utc.fix())
    }

    /// Formats `timestamp` with `pattern`. The output only depends on the
    /// arguments, the locale and the offset.
    pub fn format(
        &self,
        timestamp: &DateTime<Utc>,
        pattern: &str,
    ) -> Result<String> {
        let local = timestamp.with_timezone(&self.offset);
        let mut out = String::new();
        for token in tokenize(pattern)? {
            match token {
                Token::Literal(text) => out.push_str(&text),
                Token::Field(letter, width) => {
                    self.push_field(&mut out, &local, letter, width)
                }
            }
        }
        Ok(out)
    }

    /// Like [`DateFormatter::format`], but passes a missing timestamp
    /// through as an empty string. The pattern is still validated.
    pub fn format_optional(
        &self,
        timestamp: Option<&DateTime<Utc>>,
        pattern: &str,
    ) -> Result<String> {
        match timestamp {
            Some(timestamp) => self.format(timestamp, pattern),
            None => validate(pattern).map(|_| String::new()),
        }
    }

    fn push_field(
        &self,
        out: &mut String,
        t: &DateTime<FixedOffset>,
        letter: char,
        width: usize,
    ) {
        let number = |out: &mut String, n: u32| match width {
            1 => out.push_str(&n.to_string()),
            _ => out.push_str(&format!("{:02}", n)),
        };
        let month = t.month0() as usize;
        match letter {
            'd' => number(out, t.day()),
            'M' => match width {
                1 | 2 => number(out, t.month()),
                3 => out.push_str(self.locale.months_abbreviated[month]),
                _ => out.push_str(self.locale.months_wide[month]),
            },
            'y' => match width {
                2 => out.push_str(&format!("{:02}", t.year().rem_euclid(100))),
                _ => out.push_str(&format!("{:0w$}", t.year(), w = width)),
            },
            'H' => number(out, t.hour()),
            'h' => number(out, t.hour12().1),
            'm' => number(out, t.minute()),
            's' => number(out, t.second()),
            'a' => out.push_str(self.locale.day_periods[t.hour12().0 as usize]),
            // tokenize() only produces the letters above
            _ => unreachable!("unvalidated date field `{}`", letter),
        }
    }
}

/// Checks that `pattern` only uses supported fields.
pub fn validate(pattern: &str) -> Result<()> {
    tokenize(pattern).map(|_| ())
}

#[derive(Debug, PartialEq)]
enum Token {
    Literal(String),
    Field(char, usize),
}

fn tokenize(pattern: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                literal.push('\'');
                continue;
            }
            // quoted text runs to the next lone quote
            loop {
                match chars.next() {
                    None => break,
                    Some('\'') if chars.peek() == Some(&'\'') => {
                        chars.next();
                        literal.push('\'');
                    }
                    Some('\'') => break,
                    Some(c) => literal.push(c),
                }
            }
        } else if c.is_ascii_alphabetic() {
            let mut width = 1;
            while chars.peek() == Some(&c) {
                chars.next();
                width += 1;
            }
            if !supported(c, width) {
                return Err(Error::UnsupportedPattern {
                    pattern: pattern.to_owned(),
                    token: std::iter::repeat(c).take(width).collect(),
                });
            }
            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(Token::Field(c, width));
        } else {
            literal.push(c);
        }
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

fn supported(letter: char, width: usize) -> bool {
    match letter {
        'd' | 'H' | 'h' | 'm' | 's' => width <= 2,
        'M' => width <= 4,
        'y' => width <= 4,
        'a' => width == 1,
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_publish_pattern() -> Result<()> {
        let formatter = DateFormatter::pt_br();
        assert_eq!(
            "15 mar 2023",
            formatter.format(&at(2023, 3, 15, 0, 0), "d MMM y")?
        );
        assert_eq!(
            "5 fev 2021",
            formatter.format(&at(2021, 2, 5, 12, 0), "d MMM y")?
        );
        Ok(())
    }

    #[test]
    fn test_edited_pattern() -> Result<()> {
        assert_eq!(
            "* editado em 19 mar 2021, às 15:49",
            DateFormatter::pt_br().format(
                &at(2021, 3, 19, 15, 49),
                "'* editado em' d MMM y', às' HH:mm"
            )?
        );
        Ok(())
    }

    #[test]
    fn test_wide_and_numeric_fields() -> Result<()> {
        assert_eq!(
            "07/03/21 março 2021 09:05:00 AM",
            DateFormatter::pt_br()
                .format(&at(2021, 3, 7, 9, 5), "dd/MM/yy MMMM yyyy hh:mm:ss a")?
        );
        Ok(())
    }

    #[test]
    fn test_quotes() -> Result<()> {
        assert_eq!(
            "it's 2021 'd'",
            DateFormatter::pt_br()
                .format(&at(2021, 1, 1, 0, 0), "'it''s' y '''d'''")?
        );
        Ok(())
    }

    #[test]
    fn test_offset_applies() -> Result<()> {
        let brasilia = DateFormatter::new(
            &PT_BR,
            FixedOffset::west_opt(3 * 3600).unwrap(),
        );
        assert_eq!(
            "14 mar 2023",
            brasilia.format(&at(2023, 3, 15, 0, 0), "d MMM y")?
        );
        Ok(())
    }

    #[test]
    fn test_deterministic() -> Result<()> {
        let formatter = DateFormatter::pt_br();
        let t = at(2022, 12, 31, 23, 59);
        let pattern = "'* editado em' d MMM y', às' HH:mm";
        assert_eq!(
            formatter.format(&t, pattern)?,
            formatter.format(&t, pattern)?
        );
        Ok(())
    }

    #[test]
    fn test_unsupported_field() {
        match DateFormatter::pt_br().format(&at(2021, 1, 1, 0, 0), "d MMM Q") {
            Err(Error::UnsupportedPattern { token, .. }) => {
                assert_eq!("Q", token)
            }
            other => panic!("wanted unsupported pattern, got {:?}", other),
        }
        assert!(validate("ddd").is_err());
        assert!(validate("d MMM y").is_ok());
    }

    #[test]
    fn test_optional_passthrough() -> Result<()> {
        let formatter = DateFormatter::pt_br();
        assert_eq!("", formatter.format_optional(None, "d MMM y")?);
        assert_eq!(
            "15 mar 2023",
            formatter.format_optional(Some(&at(2023, 3, 15, 0, 0)), "d MMM y")?
        );
        assert!(formatter.format_optional(None, "Q").is_err());
        Ok(())
    }
}
