//! Selector resolution and per-type selector bookkeeping.

use std::collections::{BTreeMap, BTreeSet};

use msgbridge_model::{InteropAnnotation, InteropRole, MemberId, MethodDecl, TypeDecl};

use crate::errors::{TransformErrorKind, TransformResult};

/// Name of the static field caching an interned selector.
pub fn selector_field_name(selector: &str) -> String {
    format!("$sel${}", mangle(selector))
}

/// Selector with colons replaced, usable inside member names.
pub fn mangle(selector: &str) -> String {
    selector.replace(':', "$")
}

/// Selector of a `Method` or `IBAction` member.
pub fn method_selector(annotation: &InteropAnnotation, method: &MethodDecl, extension: bool) -> String {
    if let Some(selector) = annotation.explicit_selector() {
        return selector.to_owned();
    }
    let arity = method.params.len();
    if annotation.role == InteropRole::IBAction && arity == 2 {
        return format!("{}:withEvent:", method.name);
    }
    let colons = arity.saturating_sub(usize::from(extension));
    format!("{}{}", method.name, ":".repeat(colons))
}

/// Selector of a property-style member: `getName`/`isName` -> `name`, `setName` -> `setName:`.
pub fn property_selector(
    annotation: &InteropAnnotation,
    id: &MemberId,
    method: &MethodDecl,
    is_getter: bool,
) -> TransformResult<String> {
    if let Some(selector) = annotation.explicit_selector() {
        return Ok(selector.to_owned());
    }
    let name = method.name.as_str();
    if is_getter {
        if let Some(property) = getter_property(name, true) {
            return Ok(property);
        }
    } else if strip_prefix(name, "set").is_some() {
        return Ok(format!("{name}:"));
    }
    Err(TransformErrorKind::UnresolvableConvention {
        member: id.to_string(),
        role: annotation.role,
    }
    .into())
}

/// Selector of any classified member.
pub fn resolve(
    annotation: &InteropAnnotation,
    decl: &TypeDecl,
    method: &MethodDecl,
    is_getter: bool,
    extension: bool,
) -> TransformResult<String> {
    if annotation.role.is_property_style() {
        property_selector(annotation, &decl.method_id(method), method, is_getter)
    } else {
        Ok(method_selector(annotation, method, extension))
    }
}

/// Property name of a bean-style getter. `is` prefixes are accepted when `allow_is` is set.
pub fn getter_property(name: &str, allow_is: bool) -> Option<String> {
    strip_prefix(name, "get")
        .or_else(|| allow_is.then(|| strip_prefix(name, "is")).flatten())
        .map(decapitalize)
}

/// Property name of a bean-style setter.
pub fn setter_property(name: &str) -> Option<String> {
    strip_prefix(name, "set").map(decapitalize)
}

fn strip_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    name.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}

fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether a subclass could override `method`, and so whether it claims its selector.
pub fn is_overridable(decl: &TypeDecl, method: &MethodDecl) -> bool {
    let modifiers = &method.modifiers;
    !(modifiers.is_static || modifiers.is_private() || modifiers.is_final || decl.is_final())
}

/// Selectors of one type: the sorted registration set and the overridable claims.
#[derive(Debug, Default)]
pub struct SelectorTable {
    registered: BTreeSet<String>,
    claims: BTreeMap<String, MemberId>,
}

impl SelectorTable {
    /// Claim `selector` for an overridable member; a second claim is a collision.
    pub fn claim(&mut self, selector: &str, member: MemberId) -> TransformResult<()> {
        if let Some(first) = self.claims.get(selector) {
            return Err(TransformErrorKind::SelectorCollision {
                owner: member.owner.clone(),
                selector: selector.to_owned(),
                first: first.to_string(),
                second: member.to_string(),
            }
            .into());
        }
        self.claims.insert(selector.to_owned(), member);
        Ok(())
    }

    pub fn register(&mut self, selector: &str) {
        self.registered.insert(selector.to_owned());
    }

    /// Registered selectors in sorted order.
    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.registered.iter().map(String::as_str)
    }
}
