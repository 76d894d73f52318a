//! Declarations: types, fields, methods and the annotations that drive the transform.

use std::fmt;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::body::Body;
use crate::types::{Param, TypeName, ValueAttrs, ValueType};

/// Name of instance constructors.
pub const CONSTRUCTOR: &str = "<init>";
/// Name of the static initializer.
pub const STATIC_INITIALIZER: &str = "<clinit>";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Package,
    Private,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub visibility: Visibility,
    #[serde(rename = "static")]
    pub is_static: bool,
    #[serde(rename = "final")]
    pub is_final: bool,
    #[serde(rename = "native")]
    pub is_native: bool,
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
}

impl Modifiers {
    pub fn private_static() -> Self {
        Modifiers {
            visibility: Visibility::Private,
            is_static: true,
            ..Default::default()
        }
    }

    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }
}

/// Interop role of a member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum InteropRole {
    #[display("@Method")]
    Method,
    #[display("@Property")]
    Property,
    #[display("@IBAction")]
    IBAction,
    #[display("@IBOutlet")]
    IBOutlet,
    #[display("@IBOutletCollection")]
    IBOutletCollection,
    #[display("@IBInspectable")]
    IBInspectable,
}

impl InteropRole {
    /// Roles following the getter/setter naming convention.
    pub fn is_property_style(self) -> bool {
        matches!(
            self,
            InteropRole::Property
                | InteropRole::IBOutlet
                | InteropRole::IBOutletCollection
                | InteropRole::IBInspectable
        )
    }

    /// Roles that may annotate fields.
    pub fn is_outlet_style(self) -> bool {
        matches!(
            self,
            InteropRole::IBOutlet | InteropRole::IBOutletCollection | InteropRole::IBInspectable
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteropAnnotation {
    pub role: InteropRole,
    #[serde(default)]
    pub selector: Option<String>,
    /// Explicit property name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub strong_ref: bool,
}

impl InteropAnnotation {
    pub fn new(role: InteropRole) -> Self {
        InteropAnnotation {
            role,
            selector: None,
            name: None,
            strong_ref: false,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// The explicit selector, ignoring blank values.
    pub fn explicit_selector(&self) -> Option<&str> {
        self.selector.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn explicit_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Member annotations, both declared and synthesized markers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    Interop(InteropAnnotation),
    NotImplemented,
    TypeEncoding(String),
    /// Marshaler override for the receiver site.
    Marshaler(String),
    /// Outbound native send trampoline.
    Bridge,
    /// Inbound entry point called by the foreign runtime.
    Callback,
    BindSelector(String),
    /// Body is emitted as a descriptor copy into the named symbol.
    PublishDescriptor(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
    Struct,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassAnnotation {
    /// Binding of a class implemented by the foreign runtime.
    NativeClass,
    /// Managed subclass registered with the runtime, optionally under an explicit name.
    CustomClass {
        #[serde(default)]
        name: Option<String>,
    },
    /// Generated proxy implementing a protocol for the runtime.
    NativeProtocolProxy,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: ValueType,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: ValueType, modifiers: Modifiers) -> Self {
        FieldDecl {
            name: name.into(),
            ty,
            modifiers,
            annotations: Vec::new(),
        }
    }

    pub fn interop(&self) -> Vec<&InteropAnnotation> {
        interop_annotations(&self.annotations)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default = "void")]
    pub ret: ValueType,
    #[serde(default)]
    pub ret_attrs: ValueAttrs,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub body: Option<Body>,
}

fn void() -> ValueType {
    ValueType::Void
}

impl MethodDecl {
    pub fn new(
        name: impl Into<String>,
        params: Vec<Param>,
        ret: ValueType,
        modifiers: Modifiers,
    ) -> Self {
        MethodDecl {
            name: name.into(),
            params,
            ret,
            ret_attrs: ValueAttrs::default(),
            modifiers,
            annotations: Vec::new(),
            body: None,
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == STATIC_INITIALIZER
    }

    pub fn param_types(&self) -> Vec<ValueType> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn interop(&self) -> Vec<&InteropAnnotation> {
        interop_annotations(&self.annotations)
    }

    pub fn has_annotation(&self, annotation: &Annotation) -> bool {
        self.annotations.contains(annotation)
    }

    pub fn is_not_implemented(&self) -> bool {
        self.has_annotation(&Annotation::NotImplemented)
    }

    pub fn type_encoding(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::TypeEncoding(encoding) => Some(encoding.as_str()),
            _ => None,
        })
    }

    pub fn receiver_marshaler(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Marshaler(marshaler) => Some(marshaler.as_str()),
            _ => None,
        })
    }

    pub fn bound_selector(&self) -> Option<&str> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::BindSelector(selector) => Some(selector.as_str()),
            _ => None,
        })
    }

    /// Name and parameter types, the identity used for overriding.
    pub fn sub_signature(&self) -> SubSignature {
        SubSignature {
            name: self.name.clone(),
            params: self.param_types(),
            ret: self.ret.clone(),
        }
    }

    /// Whether this has the same name, parameters and return type as `other`.
    pub fn same_signature(&self, other: &MethodDecl) -> bool {
        self.name == other.name && self.ret == other.ret && self.param_types() == other.param_types()
    }
}

fn interop_annotations(annotations: &[Annotation]) -> Vec<&InteropAnnotation> {
    annotations
        .iter()
        .filter_map(|a| match a {
            Annotation::Interop(interop) => Some(interop),
            _ => None,
        })
        .collect()
}

/// Signature of a method within its declaring type, e.g. `void <init>(int,a.B)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubSignature {
    pub name: String,
    pub params: Vec<ValueType>,
    pub ret: ValueType,
}

impl SubSignature {
    /// Parameter descriptor used to key constructor signatures, e.g. `(ILa/B;)`.
    pub fn param_descriptor(&self) -> String {
        let params: String = self.params.iter().map(ValueType::descriptor).collect();
        format!("({params})")
    }
}

impl fmt::Display for SubSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.ret, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}

/// A member identified by its declaring type, used in diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
#[display("<{owner}: {signature}>")]
pub struct MemberId {
    pub owner: TypeName,
    pub signature: SubSignature,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: TypeName,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub superclass: Option<TypeName>,
    #[serde(default)]
    pub interfaces: Vec<TypeName>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub annotations: Vec<ClassAnnotation>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    /// Member types of a `struct` kind, in declaration order.
    #[serde(default)]
    pub struct_members: Vec<ValueType>,
}

impl TypeDecl {
    pub fn new(name: impl Into<TypeName>, kind: TypeKind) -> Self {
        TypeDecl {
            name: name.into(),
            kind,
            superclass: None,
            interfaces: Vec::new(),
            modifiers: Modifiers::default(),
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            struct_members: Vec::new(),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_final(&self) -> bool {
        self.modifiers.is_final
    }

    pub fn is_native_class(&self) -> bool {
        self.annotations.contains(&ClassAnnotation::NativeClass)
    }

    pub fn is_protocol_proxy(&self) -> bool {
        self.annotations.contains(&ClassAnnotation::NativeProtocolProxy)
    }

    /// Whether the type carries an explicit custom class annotation.
    pub fn has_custom_class_annotation(&self) -> bool {
        self.annotations
            .iter()
            .any(|a| matches!(a, ClassAnnotation::CustomClass { .. }))
    }

    /// Name the type is registered under in the foreign runtime.
    pub fn custom_class_name(&self) -> String {
        self.annotations
            .iter()
            .find_map(|a| match a {
                ClassAnnotation::CustomClass { name } => name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_owned),
                _ => None,
            })
            .unwrap_or_else(|| format!("j_{}", self.name.mangled()))
    }

    pub fn method_id(&self, method: &MethodDecl) -> MemberId {
        MemberId {
            owner: self.name.clone(),
            signature: method.sub_signature(),
        }
    }

    pub fn field_id(&self, field: &FieldDecl) -> String {
        format!("<{}: {} {}>", self.name, field.ty, field.name)
    }

    pub fn find_method(&self, name: &str, params: &[ValueType], ret: &ValueType) -> Option<&MethodDecl> {
        self.methods
            .iter()
            .find(|m| m.name == name && &m.ret == ret && m.param_types() == params)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn constructors(&self) -> impl Iterator<Item = &MethodDecl> {
        self.methods.iter().filter(|m| m.is_constructor())
    }

    /// Body of the static initializer. A missing initializer, or one declared without a body,
    /// starts out as a lone `return`.
    pub fn static_initializer_body(&mut self) -> &mut Body {
        let index = match self.methods.iter().position(MethodDecl::is_static_initializer) {
            Some(index) => index,
            None => {
                self.methods.push(MethodDecl::new(
                    STATIC_INITIALIZER,
                    Vec::new(),
                    ValueType::Void,
                    Modifiers {
                        is_static: true,
                        ..Default::default()
                    },
                ));
                self.methods.len() - 1
            }
        };
        self.methods[index].body.get_or_insert_with(|| Body {
            locals: Vec::new(),
            stmts: vec![crate::body::Stmt::Return(None)],
        })
    }
}

/// Descriptor symbol requested by a custom class.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DescriptorExport {
    pub class: TypeName,
    pub symbol: String,
}

impl DescriptorExport {
    pub const SYMBOL_PREFIX: &'static str = "OBJC_CLASS_$_";

    pub fn for_type(decl: &TypeDecl) -> Self {
        DescriptorExport {
            class: decl.name.clone(),
            symbol: format!("{}{}", Self::SYMBOL_PREFIX, decl.custom_class_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_class_name() {
        let mut decl = TypeDecl::new("com.example.MyView", TypeKind::Class);
        decl.annotations.push(ClassAnnotation::CustomClass { name: None });
        assert_eq!(decl.custom_class_name(), "j_com_example_MyView");

        decl.annotations = vec![ClassAnnotation::CustomClass {
            name: Some("  MyView ".into()),
        }];
        assert_eq!(decl.custom_class_name(), "MyView");
        assert_eq!(DescriptorExport::for_type(&decl).symbol, "OBJC_CLASS_$_MyView");
    }

    #[test]
    fn test_sub_signature_display() {
        let method = MethodDecl::new(
            CONSTRUCTOR,
            vec![ValueType::Int.into(), ValueType::object("a.B").into()],
            ValueType::Void,
            Modifiers::default(),
        );
        let signature = method.sub_signature();
        assert_eq!(signature.to_string(), "void <init>(int,a.B)");
        assert_eq!(signature.param_descriptor(), "(ILa/B;)");
    }

    #[test]
    fn test_static_initializer_created_once() {
        let mut decl = TypeDecl::new("a.B", TypeKind::Class);
        decl.static_initializer_body();
        decl.static_initializer_body();
        assert_eq!(decl.methods.len(), 1);
        assert!(decl.methods[0].modifiers.is_static);
    }

    #[test]
    fn test_declared_static_initializer_without_body() {
        let mut decl = TypeDecl::new("a.B", TypeKind::Class);
        let clinit = MethodDecl::new(
            STATIC_INITIALIZER,
            vec![],
            ValueType::Void,
            Modifiers {
                is_static: true,
                ..Default::default()
            },
        );
        decl.methods.push(clinit);

        let body = decl.static_initializer_body();
        assert_eq!(body.stmts, vec![crate::body::Stmt::Return(None)]);
        assert_eq!(decl.methods.len(), 1);
        assert!(decl.methods[0].body.is_some());
    }

    #[test]
    fn test_blank_selector_is_not_explicit() {
        let annotation = InteropAnnotation::new(InteropRole::Method).with_selector("  ");
        assert_eq!(annotation.explicit_selector(), None);
    }

    #[test]
    fn test_modifiers_json() {
        let modifiers: Modifiers =
            serde_json::from_str(r#"{"native": true, "visibility": "private"}"#).unwrap();
        assert!(modifiers.is_native);
        assert!(modifiers.is_private());
        assert!(!modifiers.is_static);
    }
}
