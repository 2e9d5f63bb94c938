// ABOUTME: Best-effort CREATE TABLE parser feeding field-level schema diffing
// ABOUTME: Extracts column name, type, nullability, default and residual constraints

use crate::schema::{FieldDefinition, TableDefinition};

/// Parse the text of a `CREATE TABLE` statement into a [`TableDefinition`].
///
/// Handles the definition shapes SQLite itself stores in `sqlite_master`:
/// quoted identifiers (`"a b"`, `` `a` ``, `[a]`), multi-word types,
/// parenthesized type arguments, table-level constraint clauses (skipped),
/// and trailing table options (`WITHOUT ROWID`, `STRICT`).
///
/// Returns `None` for statements that do not look like a table definition;
/// callers fall back to whole-text comparison in that case.
pub fn parse_create_table(sql: &str) -> Option<TableDefinition> {
    let open = find_top_level(sql, '(')?;
    let close = sql.rfind(')')?;
    if close <= open {
        return None;
    }

    let header = tokenize(&sql[..open]);
    if header.is_empty() || !header[0].eq_ignore_ascii_case("CREATE") {
        return None;
    }
    if !header.iter().any(|t| t.eq_ignore_ascii_case("TABLE")) {
        return None;
    }
    let name = unquote_ident(header.last()?);

    let mut fields = Vec::new();
    for item in split_top_level(&sql[open + 1..close]) {
        let tokens = tokenize(item.trim());
        let first = match tokens.first() {
            Some(t) => t,
            None => continue,
        };
        if is_table_constraint(first) {
            continue;
        }
        fields.push(parse_field(&tokens));
    }

    Some(TableDefinition { name, fields })
}

fn parse_field(tokens: &[String]) -> FieldDefinition {
    let name = unquote_ident(&tokens[0]);

    // Type text runs from the second token up to the first constraint
    // keyword.
    let mut type_name = String::new();
    let mut idx = 1;
    while idx < tokens.len() && !is_constraint_start(&tokens[idx]) {
        append_token(&mut type_name, &tokens[idx]);
        idx += 1;
    }

    let mut nullable = true;
    let mut default = None;
    let mut constraints = String::new();

    while idx < tokens.len() {
        let upper = tokens[idx].to_ascii_uppercase();
        match upper.as_str() {
            "NOT" if tokens.get(idx + 1).is_some_and(|t| t.eq_ignore_ascii_case("NULL")) => {
                nullable = false;
                idx += 2;
            }
            "NULL" => {
                nullable = true;
                idx += 1;
            }
            "DEFAULT" => {
                idx += 1;
                if let Some(value) = tokens.get(idx) {
                    default = Some(value.clone());
                    idx += 1;
                }
            }
            _ => {
                append_token(&mut constraints, &tokens[idx]);
                idx += 1;
            }
        }
    }

    FieldDefinition {
        name,
        type_name,
        nullable,
        default,
        constraints,
    }
}

/// A parenthesized group attaches directly to the preceding token, so
/// `VARCHAR (255)` and `VARCHAR(255)` render identically.
fn append_token(buf: &mut String, token: &str) {
    if !buf.is_empty() && !token.starts_with('(') {
        buf.push(' ');
    }
    buf.push_str(token);
}

fn is_table_constraint(token: &str) -> bool {
    matches!(
        token.to_ascii_uppercase().as_str(),
        "PRIMARY" | "UNIQUE" | "CHECK" | "FOREIGN" | "CONSTRAINT"
    )
}

fn is_constraint_start(token: &str) -> bool {
    matches!(
        token.to_ascii_uppercase().as_str(),
        "PRIMARY"
            | "NOT"
            | "NULL"
            | "UNIQUE"
            | "CHECK"
            | "DEFAULT"
            | "COLLATE"
            | "REFERENCES"
            | "GENERATED"
            | "AS"
            | "CONSTRAINT"
    )
}

/// Position of the first occurrence of `target` outside quoted regions.
fn find_top_level(input: &str, target: char) -> Option<usize> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    let mut byte = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == target {
            return Some(byte);
        }
        if matches!(c, '\'' | '"' | '`') {
            let end = skip_quoted(&chars, i);
            byte += chars[i..end].iter().map(|c| c.len_utf8()).sum::<usize>();
            i = end;
            continue;
        }
        if c == '[' {
            while i < chars.len() && chars[i] != ']' {
                byte += chars[i].len_utf8();
                i += 1;
            }
            continue;
        }
        byte += c.len_utf8();
        i += 1;
    }
    None
}

/// Split a definition body on commas at parenthesis depth zero.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let bytes: Vec<char> = body.chars().collect();
    let mut i = 0;
    let mut byte = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&body[start..byte]);
                start = byte + 1;
            }
            '\'' | '"' | '`' => {
                let end = skip_quoted(&bytes, i);
                byte += bytes[i..end].iter().map(|c| c.len_utf8()).sum::<usize>();
                i = end;
                continue;
            }
            '[' => {
                while i < bytes.len() && bytes[i] != ']' {
                    byte += bytes[i].len_utf8();
                    i += 1;
                }
                continue;
            }
            _ => {}
        }
        byte += c.len_utf8();
        i += 1;
    }
    items.push(&body[start..]);
    items
}

/// Break text into tokens: bare words, quoted identifiers/literals (quotes
/// retained) and balanced parenthesized groups as single tokens.
fn tokenize(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '(' {
            let start = i;
            let mut depth = 0usize;
            while i < chars.len() {
                match chars[i] {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            i += 1;
                            break;
                        }
                    }
                    '\'' | '"' | '`' => {
                        i = skip_quoted(&chars, i);
                        continue;
                    }
                    _ => {}
                }
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
            continue;
        }
        if matches!(c, '\'' | '"' | '`') {
            let start = i;
            i = skip_quoted(&chars, i);
            tokens.push(chars[start..i].iter().collect());
            continue;
        }
        if c == '[' {
            let start = i;
            while i < chars.len() && chars[i] != ']' {
                i += 1;
            }
            if i < chars.len() {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
            continue;
        }
        let start = i;
        while i < chars.len()
            && !chars[i].is_whitespace()
            && !matches!(chars[i], '(' | '\'' | '"' | '`' | '[' | ',')
        {
            i += 1;
        }
        if i == start {
            // Stray comma or similar; consume one character.
            i += 1;
            continue;
        }
        tokens.push(chars[start..i].iter().collect());
    }
    tokens
}

/// Index just past a quoted region starting at `start`. Doubled quote
/// characters inside the region are escapes.
fn skip_quoted(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn unquote_ident(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(q @ ('"' | '`' | '\'')) if token.len() >= 2 && token.ends_with(q) => {
            let inner = &token[q.len_utf8()..token.len() - q.len_utf8()];
            inner.replace(&format!("{q}{q}"), &q.to_string())
        }
        Some('[') if token.ends_with(']') => token[1..token.len() - 1].to_string(),
        _ => token.to_string(),
    }
}
