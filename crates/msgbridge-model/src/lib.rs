//! Program model for the msgbridge member transform.
//!
//! A [`ClassPath`] holds [`TypeDecl`]s whose methods carry interop [`Annotation`]s and,
//! once synthesized, structured [`Body`] IR.

pub mod body;
pub mod class_path;
pub mod decl;
pub mod marshal;
pub mod names;
pub mod printer;
pub mod types;

pub use body::{
    Body, BodyBuilder, Condition, Const, Expr, FieldRef, InvokeKind, Local, LocalId, MethodRef,
    Operand, RuntimeCall, Stmt,
};
pub use class_path::{ClassPath, ClassPathFile};
pub use decl::{
    Annotation, ClassAnnotation, DescriptorExport, FieldDecl, InteropAnnotation, InteropRole,
    MemberId, MethodDecl, Modifiers, SubSignature, TypeDecl, TypeKind, Visibility, CONSTRUCTOR,
    STATIC_INITIALIZER,
};
pub use marshal::{DefaultMarshalers, MarshalSite, MarshalStrategy, MarshalerLookup, SitePosition};
pub use names::RuntimeNames;
pub use types::{MachineSized, Param, TypeName, ValueAttrs, ValueType};
