//! Rule file compiler.
//!
//! Works line by line. A rule runs from its `[name]` header to the next
//! header; inside it, option lines come first, then trigger lines, then
//! `annotation:` / `relation:` sections made of `key=value` lines.
//!
//! Sections are first collected raw and then compiled in two passes
//! (constructors, then relations) so that a relation naming a constructor
//! declared further down can be reported as a forward reference.

use std::collections::HashSet;

use super::expr::{self, Expr};
use super::{AnnotationSpec, Endpoint, RelationSpec, Rule, Scope};
use crate::error::{RuleSyntaxError, SourcePosition};
use crate::pattern::CompiledTrigger;
use crate::types::{TypeId, TypeKind, TypeTable};

/// Where type names come from while compiling.
pub(crate) enum Types<'t> {
    /// Intern every name the program mentions.
    Open(TypeTable),
    /// Resolve against a caller-owned table; unknown names are errors.
    Fixed(&'t TypeTable),
}

impl Types<'_> {
    fn resolve(&mut self, name: &str, kind: TypeKind) -> Result<TypeId, String> {
        let table = match self {
            Types::Open(table) => {
                if table.lookup(name).is_none() {
                    return Ok(table.register(name, kind, None));
                }
                &*table
            }
            Types::Fixed(table) => &**table,
        };
        let id = table.lookup(name).ok_or_else(|| format!("unknown {} type '{name}'", kind.as_str()))?;
        match table.get(id).map(|d| d.kind) {
            Some(found) if found == kind => Ok(id),
            Some(found) => Err(format!("'{name}' is {} type, expected {} type", article(found), article(kind))),
            None => Err(format!("unknown {} type '{name}'", kind.as_str())),
        }
    }

    fn into_table(self) -> TypeTable {
        match self {
            Types::Open(table) => table,
            Types::Fixed(table) => table.clone(),
        }
    }
}

fn article(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Annotation => "an annotation",
        TypeKind::Relation => "a relation",
    }
}

pub(crate) fn parse_program(source: &str, types: Types<'_>) -> Result<(Vec<Rule>, TypeTable), RuleSyntaxError> {
    let mut parser = ProgramParser { source, lines: split_lines(source), cursor: 0, types, rule: None };
    let mut rules = Vec::new();
    let mut names = HashSet::new();
    while let Some(line) = parser.next_significant() {
        if !line.trimmed().starts_with('[') {
            return Err(parser.error(line.content_offset(), "expected rule header '[name]'"));
        }
        let rule = parser.rule(line, &mut names)?;
        rules.push(rule);
    }
    Ok((rules, parser.types.into_table()))
}

#[derive(Debug, Clone, Copy)]
struct Line<'s> {
    text: &'s str,
    offset: usize,
}

impl<'s> Line<'s> {
    fn trimmed(&self) -> &'s str {
        self.text.trim()
    }

    /// Offset of the first non-blank character.
    fn content_offset(&self) -> usize {
        self.offset + (self.text.len() - self.text.trim_start().len())
    }

    fn is_significant(&self) -> bool {
        let t = self.trimmed();
        !t.is_empty() && !t.starts_with('#')
    }

    fn is_header(&self) -> bool {
        self.trimmed().starts_with('[')
    }

    fn section_keyword(&self) -> Option<&'s str> {
        let caps = crate::regex!(r"^\s*([A-Za-z_]\w*)\s*:\s*$").captures(self.text)?;
        caps.get(1).map(|m| m.as_str())
    }
}

fn split_lines(source: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in source.split_inclusive('\n') {
        lines.push(Line { text: raw.trim_end_matches(['\n', '\r']), offset });
        offset += raw.len();
    }
    lines
}

/// One `key=value` line inside a section.
#[derive(Debug)]
struct Entry<'s> {
    key: &'s str,
    value: &'s str,
    key_offset: usize,
    value_offset: usize,
}

#[derive(Debug)]
struct RawSection<'s> {
    keyword: &'s str,
    offset: usize,
    entries: Vec<Entry<'s>>,
}

/// A compiled constructor as seen by relation endpoint resolution.
struct ConstructorRef<'s> {
    /// Position among all sections of the rule.
    declared: usize,
    /// Reference name: `name=`, or the capture name when unnamed.
    reference: &'s str,
}

/// Maps offsets in the joined trigger text back to the source.
struct TriggerText {
    text: String,
    /// `(offset in text, offset in source)` per trigger line.
    segments: Vec<(usize, usize)>,
}

impl TriggerText {
    fn source_offset(&self, position: usize) -> usize {
        let (joined, source) = self.segments.iter().rev().find(|(j, _)| *j <= position).copied().unwrap_or((0, 0));
        source + (position - joined)
    }
}

struct ProgramParser<'s, 't> {
    source: &'s str,
    lines: Vec<Line<'s>>,
    cursor: usize,
    types: Types<'t>,
    /// Rule currently being compiled, for error messages.
    rule: Option<String>,
}

impl<'s> ProgramParser<'s, '_> {
    fn error(&self, offset: usize, message: impl Into<String>) -> RuleSyntaxError {
        RuleSyntaxError {
            rule: self.rule.clone(),
            position: SourcePosition::locate(self.source, offset),
            message: message.into(),
        }
    }

    fn peek_significant(&mut self) -> Option<Line<'s>> {
        while let Some(line) = self.lines.get(self.cursor) {
            if line.is_significant() {
                return Some(*line);
            }
            self.cursor += 1;
        }
        None
    }

    fn next_significant(&mut self) -> Option<Line<'s>> {
        let line = self.peek_significant()?;
        self.cursor += 1;
        Some(line)
    }

    fn rule(&mut self, header: Line<'s>, names: &mut HashSet<String>) -> Result<Rule, RuleSyntaxError> {
        self.rule = None;
        let name_re = crate::regex!(r"^\[\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\]$");
        let name = name_re
            .captures(header.trimmed())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| self.error(header.content_offset(), "malformed rule header"))?;
        if !names.insert(name.clone()) {
            return Err(self.error(header.content_offset(), format!("duplicate rule name '{name}'")));
        }
        self.rule = Some(name.clone());

        let scope = self.options()?;
        let trigger = self.trigger(header)?;

        let mut sections = Vec::new();
        while let Some(line) = self.peek_significant() {
            if line.is_header() {
                break;
            }
            self.cursor += 1;
            let keyword = line.section_keyword().unwrap_or_default();
            if !matches!(keyword, "annotation" | "relation") {
                return Err(self.error(line.content_offset(), format!("unknown section '{}'", line.trimmed())));
            }
            sections.push(RawSection { keyword, offset: line.content_offset(), entries: self.entries()? });
        }

        let mut annotations = Vec::new();
        let mut constructors = Vec::new();
        let mut constructor_names = HashSet::new();
        for (declared, section) in sections.iter().enumerate().filter(|(_, s)| s.keyword == "annotation") {
            let spec = self.annotation(section, &trigger)?;
            if let Some(n) = &spec.name {
                if !constructor_names.insert(n.clone()) {
                    let offset = section.entries.iter().find(|e| e.key == "name").map_or(section.offset, |e| e.value_offset);
                    return Err(self.error(offset, format!("duplicate annotation name '{n}'")));
                }
            }
            let key = if spec.name.is_some() { "name" } else { "capture" };
            let reference = section.entries.iter().find(|e| e.key == key).map_or("", |e| e.value);
            constructors.push(ConstructorRef { declared, reference });
            annotations.push(spec);
        }

        let mut relations = Vec::new();
        for (declared, section) in sections.iter().enumerate().filter(|(_, s)| s.keyword == "relation") {
            relations.push(self.relation(declared, section, &trigger, &constructors)?);
        }

        Ok(Rule { name, trigger, scope, annotations, relations })
    }

    fn options(&mut self) -> Result<Scope, RuleSyntaxError> {
        let option_re = crate::regex!(r"^\s*scope\s*=\s*(\S*)\s*$");
        let mut scope = None;
        while let Some(line) = self.peek_significant() {
            let Some(caps) = option_re.captures(line.text) else { break };
            self.cursor += 1;
            let value = caps.get(1).map_or("", |m| m.as_str());
            if scope.is_some() {
                return Err(self.error(line.content_offset(), "repeated option 'scope'"));
            }
            scope = Some(match value {
                "sentence" => Scope::Sentence,
                "document" => Scope::Document,
                other => {
                    let offset = line.offset + caps.get(1).map_or(0, |m| m.start());
                    return Err(self.error(offset, format!("unknown scope '{other}', expected sentence or document")));
                }
            });
        }
        Ok(scope.unwrap_or_default())
    }

    fn trigger(&mut self, header: Line<'s>) -> Result<CompiledTrigger, RuleSyntaxError> {
        let mut trigger = TriggerText { text: String::new(), segments: Vec::new() };
        while let Some(line) = self.peek_significant() {
            if line.is_header() || line.section_keyword().is_some() {
                break;
            }
            self.cursor += 1;
            if !trigger.text.is_empty() {
                trigger.text.push(' ');
            }
            trigger.segments.push((trigger.text.len(), line.content_offset()));
            trigger.text.push_str(line.trimmed());
        }
        if trigger.text.is_empty() {
            return Err(self.error(header.content_offset(), "missing trigger pattern"));
        }
        CompiledTrigger::compile(&trigger.text)
            .map_err(|e| self.error(trigger.source_offset(e.position), format!("invalid trigger: {}", e.message)))
    }

    fn entries(&mut self) -> Result<Vec<Entry<'s>>, RuleSyntaxError> {
        let entry_re = crate::regex!(r"^(\s*)(\$?[A-Za-z_][\w.\-]*)\s*=\s*(.*?)\s*$");
        let mut entries = Vec::new();
        while let Some(line) = self.peek_significant() {
            if line.is_header() || line.section_keyword().is_some() {
                break;
            }
            self.cursor += 1;
            let caps = entry_re
                .captures(line.text)
                .ok_or_else(|| self.error(line.content_offset(), "expected 'key=value' or '$ATTR = expression'"))?;
            let (Some(key), Some(value)) = (caps.get(2), caps.get(3)) else {
                return Err(self.error(line.content_offset(), "expected 'key=value'"));
            };
            entries.push(Entry {
                key: key.as_str(),
                value: value.as_str(),
                key_offset: line.offset + key.start(),
                value_offset: line.offset + value.start(),
            });
        }
        Ok(entries)
    }

    fn annotation(&mut self, section: &RawSection<'s>, trigger: &CompiledTrigger) -> Result<AnnotationSpec, RuleSyntaxError> {
        let mut capture = None;
        let mut kind = None;
        let mut name = None;
        let mut assignments: Vec<(String, Expr)> = Vec::new();

        for entry in &section.entries {
            if let Some(attribute) = entry.key.strip_prefix('$') {
                if assignments.iter().any(|(a, _)| a == attribute) {
                    return Err(self.error(entry.key_offset, format!("repeated assignment to '${attribute}'")));
                }
                let expr = self.expression(entry, trigger)?;
                if let Some(unassigned) =
                    expr.self_attributes().into_iter().find(|a| !assignments.iter().any(|(b, _)| b == a))
                {
                    return Err(
                        self.error(entry.value_offset, format!("attribute '${unassigned}' is not assigned before use"))
                    );
                }
                assignments.push((attribute.to_string(), expr));
                continue;
            }
            match entry.key {
                "capture" => {
                    self.ensure_unset(&capture, entry)?;
                    capture = Some(self.capture(entry, trigger)?);
                }
                "type" => {
                    self.ensure_unset(&kind, entry)?;
                    kind = Some(self.type_id(entry, TypeKind::Annotation)?);
                }
                "name" => {
                    self.ensure_unset(&name, entry)?;
                    if !crate::regex!(r"^[A-Za-z_][\w.\-]*$").is_match(entry.value) {
                        return Err(self.error(entry.value_offset, format!("invalid annotation name '{}'", entry.value)));
                    }
                    name = Some(entry.value.to_string());
                }
                other => {
                    return Err(self.error(entry.key_offset, format!("unknown key '{other}' in annotation block")));
                }
            }
        }

        let capture = capture.ok_or_else(|| self.error(section.offset, "annotation block is missing 'capture'"))?;
        let kind = kind.ok_or_else(|| self.error(section.offset, "annotation block is missing 'type'"))?;
        Ok(AnnotationSpec { capture, kind, name, assignments })
    }

    fn relation(
        &mut self,
        declared: usize,
        section: &RawSection<'s>,
        trigger: &CompiledTrigger,
        constructors: &[ConstructorRef<'_>],
    ) -> Result<RelationSpec, RuleSyntaxError> {
        let mut source = None;
        let mut target = None;
        let mut kind = None;
        let mut value = None;
        let mut guard = None;

        for entry in &section.entries {
            match entry.key {
                "source" => {
                    self.ensure_unset(&source, entry)?;
                    source = Some(self.endpoint(declared, entry, trigger, constructors)?);
                }
                "target" => {
                    self.ensure_unset(&target, entry)?;
                    target = Some(self.endpoint(declared, entry, trigger, constructors)?);
                }
                "type" => {
                    self.ensure_unset(&kind, entry)?;
                    kind = Some(self.type_id(entry, TypeKind::Relation)?);
                }
                "value" => {
                    self.ensure_unset(&value, entry)?;
                    value = Some(self.relation_expression(entry, trigger)?);
                }
                "guard" => {
                    self.ensure_unset(&guard, entry)?;
                    guard = Some(self.relation_expression(entry, trigger)?);
                }
                other => {
                    return Err(self.error(entry.key_offset, format!("unknown key '{other}' in relation block")));
                }
            }
        }

        let source = source.ok_or_else(|| self.error(section.offset, "relation block is missing 'source'"))?;
        let target = target.ok_or_else(|| self.error(section.offset, "relation block is missing 'target'"))?;
        let kind = kind.ok_or_else(|| self.error(section.offset, "relation block is missing 'type'"))?;
        let value = value.unwrap_or_else(|| Expr::Str(String::new()));
        Ok(RelationSpec { source, target, kind, value, guard })
    }

    fn ensure_unset<T>(&self, slot: &Option<T>, entry: &Entry<'_>) -> Result<(), RuleSyntaxError> {
        match slot {
            Some(_) => Err(self.error(entry.key_offset, format!("repeated key '{}'", entry.key))),
            None => Ok(()),
        }
    }

    fn capture(&self, entry: &Entry<'_>, trigger: &CompiledTrigger) -> Result<usize, RuleSyntaxError> {
        trigger
            .capture_index(entry.value)
            .ok_or_else(|| self.error(entry.value_offset, format!("unknown capture '{}'", entry.value)))
    }

    fn type_id(&mut self, entry: &Entry<'_>, kind: TypeKind) -> Result<TypeId, RuleSyntaxError> {
        if entry.value.is_empty() || entry.value.contains(char::is_whitespace) {
            return Err(self.error(entry.value_offset, format!("invalid type name '{}'", entry.value)));
        }
        self.types.resolve(entry.value, kind).map_err(|message| self.error(entry.value_offset, message))
    }

    fn endpoint(
        &self,
        declared: usize,
        entry: &Entry<'_>,
        trigger: &CompiledTrigger,
        constructors: &[ConstructorRef<'_>],
    ) -> Result<Endpoint, RuleSyntaxError> {
        let reference = entry.value;
        if let Some(index) = constructors.iter().rposition(|c| c.declared < declared && c.reference == reference) {
            return Ok(Endpoint::Constructed(index));
        }
        if let Some(slot) = trigger.capture_index(reference) {
            return Ok(Endpoint::Capture(slot));
        }
        if constructors.iter().any(|c| c.declared > declared && c.reference == reference) {
            return Err(self.error(entry.value_offset, format!("forward reference to annotation '{reference}' declared later")));
        }
        Err(self.error(entry.value_offset, format!("unresolved reference '{reference}'")))
    }

    fn expression(&self, entry: &Entry<'_>, trigger: &CompiledTrigger) -> Result<Expr, RuleSyntaxError> {
        expr::parse(entry.value, trigger).map_err(|e| self.error(entry.value_offset + e.position, e.message))
    }

    fn relation_expression(&self, entry: &Entry<'_>, trigger: &CompiledTrigger) -> Result<Expr, RuleSyntaxError> {
        let expr = self.expression(entry, trigger)?;
        if let Some(attribute) = expr.self_attributes().first() {
            return Err(self.error(entry.value_offset, format!("'${attribute}' is only available in annotation blocks")));
        }
        Ok(expr)
    }
}
