//! Grammar for a single scan-spec token.

use crate::looks_like_class_name;

#[derive(Debug, Eq, PartialEq)]
pub(crate) enum TokenKind {
    Unspecified,
    Jar,
    Dir,
}

#[derive(Debug, Eq, PartialEq)]
pub(crate) enum ParsedToken {
    DisableSystemPackageDenial,
    DisableAllSystemDenial,
    Entry {
        deny: bool,
        kind: TokenKind,
        is_class: bool,
        value: String,
    },
}

pub(crate) fn parse(token: &str) -> ParsedToken {
    if token == "!!" {
        return ParsedToken::DisableAllSystemDenial;
    }
    if token == "!" {
        return ParsedToken::DisableSystemPackageDenial;
    }

    let (deny, rest) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let (kind, value) = if let Some(rest) = rest.strip_prefix("jar:") {
        (TokenKind::Jar, rest)
    } else if let Some(rest) = rest.strip_prefix("dir:") {
        (TokenKind::Dir, rest)
    } else {
        (TokenKind::Unspecified, rest)
    };

    let is_class = looks_like_class_name(value);

    ParsedToken::Entry {
        deny,
        kind,
        is_class,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_package_allow() {
        assert_eq!(
            parse("com.example"),
            ParsedToken::Entry {
                deny: false,
                kind: TokenKind::Unspecified,
                is_class: false,
                value: "com.example".to_string(),
            }
        );
    }

    #[test]
    fn deny_class() {
        assert_eq!(
            parse("-com.example.Foo"),
            ParsedToken::Entry {
                deny: true,
                kind: TokenKind::Unspecified,
                is_class: true,
                value: "com.example.Foo".to_string(),
            }
        );
    }

    #[test]
    fn jar_prefix() {
        assert_eq!(
            parse("jar:app.jar"),
            ParsedToken::Entry {
                deny: false,
                kind: TokenKind::Jar,
                is_class: false,
                value: "app.jar".to_string(),
            }
        );
    }

    #[test]
    fn bang_tokens() {
        assert_eq!(parse("!"), ParsedToken::DisableSystemPackageDenial);
        assert_eq!(parse("!!"), ParsedToken::DisableAllSystemDenial);
    }
}
