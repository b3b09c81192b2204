use super::{Document, RawValue, Section, SyntaxError};

/// Parse a whole document. `label` names the source in diagnostics.
pub fn parse_document(label: &str, src: &str) -> Result<Document, SyntaxError> {
    Parser::new(label, src).document()
}

struct Parser<'s> {
    label: &'s str,
    src: &'s str,
    bytes: &'s [u8],
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(label: &'s str, src: &'s str) -> Self {
        Self {
            label,
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.label, self.src, self.pos, message)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<(), SyntaxError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", byte as char)))
        }
    }

    /// Skip spaces and tabs only.
    fn skip_inline_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Skip all whitespace including newlines.
    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Whitespace, newlines and `;` comment lines between statements.
    fn skip_trivia(&mut self) {
        loop {
            self.skip_ws();
            if self.peek() == Some(b';') {
                while self.peek().is_some_and(|b| b != b'\n') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn document(&mut self) -> Result<Document, SyntaxError> {
        let mut sections: Vec<Section> = Vec::new();

        loop {
            self.skip_trivia();
            match self.peek() {
                None => break,
                Some(b'[') => sections.push(self.section_header()?),
                Some(_) => {
                    let property = self.property()?;
                    match sections.last_mut() {
                        Some(section) => section.properties.push(property),
                        None => {
                            self.pos = 0;
                            return Err(self.error("property before the first section header"));
                        }
                    }
                }
            }
        }

        if sections.is_empty() {
            return Err(self.error("document has no sections"));
        }
        let header = sections.remove(0);
        Ok(Document { header, sections })
    }

    fn section_header(&mut self) -> Result<Section, SyntaxError> {
        self.expect(b'[')?;
        self.skip_inline_ws();
        let tag = self.identifier()?;

        let mut attributes = Vec::new();
        loop {
            self.skip_inline_ws();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\n') | None => return Err(self.error("unterminated section header")),
                Some(_) => {
                    let key = self.identifier()?;
                    self.skip_inline_ws();
                    self.expect(b'=')?;
                    let value = self.value()?;
                    attributes.push((key, value));
                }
            }
        }

        Ok(Section {
            tag,
            attributes,
            properties: Vec::new(),
        })
    }

    fn identifier(&mut self) -> Result<String, SyntaxError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    /// `key = value`; keys may contain `/` (e.g. `metadata/_edit_group_`).
    fn property(&mut self) -> Result<(String, RawValue), SyntaxError> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b != b'=' && b != b'\n') {
            self.pos += 1;
        }
        if self.peek() != Some(b'=') {
            return Err(self.error("expected `=` after property name"));
        }

        let key = self.src[start..self.pos].trim();
        if key.is_empty() {
            return Err(self.error("missing property name"));
        }
        let key = key.trim_matches('"').to_string();
        self.pos += 1;

        let value = self.value()?;
        Ok((key, value))
    }

    fn value(&mut self) -> Result<RawValue, SyntaxError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input, expected a value")),
            Some(b'"') => Ok(RawValue::Str(self.string()?)),
            Some(b'&' | b'^') if self.peek_at(1) == Some(b'"') => {
                self.pos += 1;
                Ok(RawValue::Str(self.string()?))
            }
            Some(b'[') => self.array(),
            Some(b'{') => self.dictionary(),
            Some(b) if b == b'-' || b == b'+' || b == b'.' || b.is_ascii_digit() => self.number(),
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => self.word(),
            Some(_) => Err(self.error("unexpected character in value")),
        }
    }

    fn string(&mut self) -> Result<String, SyntaxError> {
        let start = self.pos;
        self.expect(b'"')?;

        let mut out = String::new();
        let mut chars = self.src[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                other => out.push(other),
            }
        }

        self.pos = start;
        Err(self.error("unterminated string"))
    }

    fn number(&mut self) -> Result<RawValue, SyntaxError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
        {
            self.pos += 1;
        }

        let text = &self.src[start..self.pos];
        if let Ok(int) = text.parse::<i64>() {
            return Ok(RawValue::Int(int));
        }
        match text.parse::<f64>() {
            Ok(float) => Ok(RawValue::Float(float)),
            Err(_) => {
                self.pos = start;
                Err(self.error(format!("invalid number `{text}`")))
            }
        }
    }

    fn array(&mut self) -> Result<RawValue, SyntaxError> {
        self.expect(b'[')?;
        let items = self.list(b']')?;
        Ok(RawValue::Array(items))
    }

    /// Comma-separated values up to `close`; trailing commas are allowed and
    /// `key: value` pairs keep only the value.
    fn list(&mut self, close: u8) -> Result<Vec<RawValue>, SyntaxError> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }

            let mut item = self.value()?;
            self.skip_ws();
            if self.peek() == Some(b':') {
                self.pos += 1;
                item = self.value()?;
                self.skip_ws();
            }
            items.push(item);

            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b) if b == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                _ => return Err(self.error(format!("expected `,` or `{}`", close as char))),
            }
        }
    }

    fn dictionary(&mut self) -> Result<RawValue, SyntaxError> {
        self.expect(b'{')?;
        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(RawValue::Opaque("Dictionary".to_string()));
            }

            self.value()?;
            self.skip_ws();
            self.expect(b':')?;
            self.value()?;
            self.skip_ws();

            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(RawValue::Opaque("Dictionary".to_string()));
                }
                _ => return Err(self.error("expected `,` or `}`")),
            }
        }
    }

    /// Keywords, bare identifiers and constructor calls such as
    /// `ExtResource("1")` or `Array[Resource]([...])`.
    fn word(&mut self) -> Result<RawValue, SyntaxError> {
        let name = self.identifier()?;
        match name.as_str() {
            "null" => return Ok(RawValue::Nil),
            "true" => return Ok(RawValue::Bool(true)),
            "false" => return Ok(RawValue::Bool(false)),
            "inf" => return Ok(RawValue::Float(f64::INFINITY)),
            "inf_neg" => return Ok(RawValue::Float(f64::NEG_INFINITY)),
            "nan" => return Ok(RawValue::Float(f64::NAN)),
            _ => {}
        }

        // Element type of typed collections is irrelevant here
        if self.peek() == Some(b'[') {
            self.array()?;
        }

        self.skip_inline_ws();
        if self.peek() != Some(b'(') {
            return Ok(RawValue::Opaque(name));
        }
        self.pos += 1;
        let call_start = self.pos;
        let mut args = self.list(b')')?;

        let value = match name.as_str() {
            "ExtResource" | "SubResource" => {
                let id = match args.first().and_then(RawValue::as_key) {
                    Some(id) => id,
                    None => {
                        self.pos = call_start;
                        return Err(self.error(format!("{name} needs a string or integer id")));
                    }
                };
                if name == "ExtResource" {
                    RawValue::ExtRef(id)
                } else {
                    RawValue::SubRef(id)
                }
            }
            "Array" if args.len() == 1 => args.remove(0),
            "Array" => RawValue::Array(args),
            "NodePath" | "StringName" => match args.into_iter().next() {
                Some(RawValue::Str(s)) => RawValue::Str(s),
                _ => RawValue::Str(String::new()),
            },
            _ => RawValue::Opaque(name),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Document {
        parse_document("res://test.tscn", src).unwrap()
    }

    fn first_property(src: &str) -> RawValue {
        let doc = parse(&format!("[gd_resource]\n[resource]\n{src}\n"));
        doc.sections[0].properties[0].1.clone()
    }

    #[test]
    fn test_scene_document() {
        let doc = parse(
            r#"[gd_scene load_steps=3 format=3 uid="uid://b6x"]

[ext_resource type="Script" path="res://player.gd" id="1_abc"]

[sub_resource type="Resource" id="Resource_x"]
damage = 3

[node name="Player" type="CharacterBody2D"]
script = ExtResource("1_abc")
stats = SubResource("Resource_x")

[node name="Sprite" type="Sprite2D" parent="."]
"#,
        );

        assert_eq!(doc.header.tag, "gd_scene");
        assert_eq!(doc.header.attribute("format"), Some(&RawValue::Int(3)));
        assert_eq!(doc.sections.len(), 4);
        assert_eq!(doc.sections_tagged("node").count(), 2);

        let player = &doc.sections[2];
        assert_eq!(player.attribute_str("name").as_deref(), Some("Player"));
        assert_eq!(
            player.properties,
            vec![
                ("script".to_string(), RawValue::ExtRef("1_abc".into())),
                ("stats".to_string(), RawValue::SubRef("Resource_x".into())),
            ]
        );
    }

    #[test]
    fn test_scalars_and_strings() {
        assert_eq!(first_property("a = null"), RawValue::Nil);
        assert_eq!(first_property("a = true"), RawValue::Bool(true));
        assert_eq!(first_property("a = -12"), RawValue::Int(-12));
        assert_eq!(first_property("a = 1.5e3"), RawValue::Float(1500.0));
        assert_eq!(
            first_property(r#"a = "say \"hi\"\nthere""#),
            RawValue::Str("say \"hi\"\nthere".into())
        );
        assert_eq!(first_property(r#"a = &"group""#), RawValue::Str("group".into()));
        assert_eq!(first_property(r#"a = NodePath("../Target")"#), RawValue::Str("../Target".into()));
    }

    #[test]
    fn test_multiline_arrays_and_typed_arrays() {
        let value = first_property("items = [ExtResource(\"2\"),\n  null,\n  SubResource(\"s\"),\n]");
        assert_eq!(
            value,
            RawValue::Array(vec![
                RawValue::ExtRef("2".into()),
                RawValue::Nil,
                RawValue::SubRef("s".into()),
            ])
        );

        let typed = first_property(r#"items = Array[ExtResource("3_k")]([ExtResource("4"), null])"#);
        assert_eq!(
            typed,
            RawValue::Array(vec![RawValue::ExtRef("4".into()), RawValue::Nil])
        );
    }

    #[test]
    fn test_legacy_integer_ids() {
        assert_eq!(first_property("a = ExtResource( 1 )"), RawValue::ExtRef("1".into()));
    }

    #[test]
    fn test_opaque_values() {
        assert_eq!(first_property("a = Vector2(1, -2.5)"), RawValue::Opaque("Vector2".into()));
        assert_eq!(
            first_property("a = {\n\"key\": [1, 2],\n\"other\": null\n}"),
            RawValue::Opaque("Dictionary".into())
        );
        assert_eq!(
            first_property(r#"a = Object(InputEventKey,"resource_local_to_scene":false,"keycode":65)"#),
            RawValue::Opaque("Object".into())
        );
    }

    #[test]
    fn test_property_keys_with_slashes_and_comments() {
        let doc = parse("; leading comment\n[gd_resource]\n[resource]\nmetadata/_edit_group_ = true\n");
        assert_eq!(doc.sections[0].properties[0].0, "metadata/_edit_group_");
    }

    #[test]
    fn test_unterminated_string_points_at_quote() {
        let src = "[gd_resource]\n[resource]\nname = \"oops\n";
        let err = parse_document("res://bad.tres", src).unwrap_err();
        assert_eq!(err.message, "unterminated string");
        assert_eq!(err.offset(), src.find('"').unwrap());
    }

    #[test]
    fn test_property_before_header_is_an_error() {
        let err = parse_document("res://bad.tres", "name = 1\n").unwrap_err();
        assert!(err.message.contains("before the first section"));
    }

    #[test]
    fn test_empty_document_is_an_error() {
        assert!(parse_document("res://empty.tres", "\n\n").is_err());
    }
}
