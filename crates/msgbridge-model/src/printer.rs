//! Textual rendering of declarations and bodies.
//!
//! Used by the CLI's `--print` flag and by snapshot tests. The format is for humans only and
//! is not parsed back.
//!
//! ```text
//! @Bridge
//! @BindSelector("draw")
//! private static native void $m$draw(app.View, objc.Selector);
//! ```

use std::fmt::Write;

use crate::body::{Body, Condition, Const, Expr, InvokeKind, Operand, RuntimeCall, Stmt};
use crate::decl::{Annotation, FieldDecl, Modifiers, MethodDecl, TypeDecl, TypeKind, Visibility};

const INDENT: &str = "    ";

pub fn print_type(decl: &TypeDecl) -> String {
    let mut out = String::new();
    let kind = match decl.kind {
        TypeKind::Class => "class",
        TypeKind::Interface => "interface",
        TypeKind::Struct => "struct",
    };
    let _ = write!(out, "{}{kind} {}", modifiers(&decl.modifiers), decl.name);
    if let Some(superclass) = &decl.superclass {
        let _ = write!(out, " extends {superclass}");
    }
    if !decl.interfaces.is_empty() {
        let list: Vec<_> = decl.interfaces.iter().map(|i| i.to_string()).collect();
        let _ = write!(out, " implements {}", list.join(", "));
    }
    out.push_str(" {\n");
    for field in &decl.fields {
        let _ = writeln!(out, "{INDENT}{}", print_field(field));
    }
    for method in &decl.methods {
        out.push('\n');
        for line in print_method(method).lines() {
            let _ = writeln!(out, "{INDENT}{line}");
        }
    }
    out.push_str("}\n");
    out
}

pub fn print_field(field: &FieldDecl) -> String {
    format!("{}{} {};", modifiers(&field.modifiers), field.ty, field.name)
}

pub fn print_method(method: &MethodDecl) -> String {
    let mut out = String::new();
    for annotation in &method.annotations {
        let _ = writeln!(out, "{}", print_annotation(annotation));
    }
    let params: Vec<_> = method.params.iter().map(|p| p.ty.to_string()).collect();
    let _ = write!(
        out,
        "{}{} {}({})",
        modifiers(&method.modifiers),
        method.ret,
        method.name,
        params.join(", ")
    );
    match &method.body {
        Some(body) => {
            out.push_str(" {\n");
            out.push_str(&print_body(body));
            out.push_str("}\n");
        }
        None => out.push_str(";\n"),
    }
    out
}

pub fn print_annotation(annotation: &Annotation) -> String {
    match annotation {
        Annotation::Interop(interop) => {
            let mut elems = Vec::new();
            if let Some(selector) = &interop.selector {
                elems.push(format!("selector = {selector:?}"));
            }
            if let Some(name) = &interop.name {
                elems.push(format!("name = {name:?}"));
            }
            if interop.strong_ref {
                elems.push("strongRef = true".to_owned());
            }
            if elems.is_empty() {
                interop.role.to_string()
            } else {
                format!("{}({})", interop.role, elems.join(", "))
            }
        }
        Annotation::NotImplemented => "@NotImplemented".into(),
        Annotation::TypeEncoding(encoding) => format!("@TypeEncoding({encoding:?})"),
        Annotation::Marshaler(marshaler) => format!("@Marshaler({marshaler})"),
        Annotation::Bridge => "@Bridge".into(),
        Annotation::Callback => "@Callback".into(),
        Annotation::BindSelector(selector) => format!("@BindSelector({selector:?})"),
        Annotation::PublishDescriptor(symbol) => format!("@PublishDescriptor({symbol:?})"),
    }
}

fn modifiers(modifiers: &Modifiers) -> String {
    let mut out = String::new();
    match modifiers.visibility {
        Visibility::Public => out.push_str("public "),
        Visibility::Protected => out.push_str("protected "),
        Visibility::Private => out.push_str("private "),
        Visibility::Package => {}
    }
    for (set, word) in [
        (modifiers.is_abstract, "abstract "),
        (modifiers.is_static, "static "),
        (modifiers.is_final, "final "),
        (modifiers.is_native, "native "),
    ] {
        if set {
            out.push_str(word);
        }
    }
    out
}

/// Render a body one statement per line, indented by one level.
pub fn print_body(body: &Body) -> String {
    let printer = BodyPrinter { body };
    let mut out = String::new();
    printer.block(&mut out, &body.stmts, 1);
    out
}

struct BodyPrinter<'a> {
    body: &'a Body,
}

impl BodyPrinter<'_> {
    fn block(&self, out: &mut String, stmts: &[Stmt], depth: usize) {
        for stmt in stmts {
            self.stmt(out, stmt, depth);
        }
    }

    fn line(&self, out: &mut String, depth: usize, text: &str) {
        for _ in 0..depth {
            out.push_str(INDENT);
        }
        out.push_str(text);
        out.push('\n');
    }

    fn stmt(&self, out: &mut String, stmt: &Stmt, depth: usize) {
        match stmt {
            Stmt::Assign { dst, value } => {
                let text = format!("{} = {}", self.operand(&Operand::Local(*dst)), self.expr(value));
                self.line(out, depth, &text);
            }
            Stmt::Eval(expr) => self.line(out, depth, &self.expr(expr)),
            Stmt::SetField {
                target,
                field,
                value,
            } => {
                let text = format!(
                    "{} = {}",
                    self.field(target.as_ref(), &field.owner.to_string(), &field.name),
                    self.operand(value)
                );
                self.line(out, depth, &text);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = match cond {
                    Condition::IsNull(op) => format!("{} == null", self.operand(op)),
                    Condition::IsTrue(op) => self.operand(op),
                };
                self.line(out, depth, &format!("if {cond} {{"));
                self.block(out, then_branch, depth + 1);
                if !else_branch.is_empty() {
                    self.line(out, depth, "} else {");
                    self.block(out, else_branch, depth + 1);
                }
                self.line(out, depth, "}");
            }
            Stmt::Dispatch {
                custom_class,
                standard,
                ancestor,
            } => {
                self.line(out, depth, &format!("dispatch {} {{", self.operand(custom_class)));
                self.line(out, depth + 1, "standard:");
                self.block(out, standard, depth + 2);
                self.line(out, depth + 1, "ancestor:");
                self.block(out, ancestor, depth + 2);
                self.line(out, depth, "}");
            }
            Stmt::Return(None) => self.line(out, depth, "return"),
            Stmt::Return(Some(op)) => self.line(out, depth, &format!("return {}", self.operand(op))),
            Stmt::Throw { class, message } => {
                self.line(out, depth, &format!("throw new {class}({message:?})"))
            }
        }
    }

    fn field(&self, target: Option<&Operand>, owner: &str, name: &str) -> String {
        match target {
            Some(target) => format!("{}.{name}", self.operand(target)),
            None => format!("{owner}.{name}"),
        }
    }

    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Use(op) => self.operand(op),
            Expr::GetField { target, field } => {
                self.field(target.as_ref(), &field.owner.to_string(), &field.name)
            }
            Expr::Invoke {
                kind,
                method,
                receiver,
                args,
            } => {
                let kind = match kind {
                    InvokeKind::Static => "static",
                    InvokeKind::Special => "special",
                    InvokeKind::Virtual => "virtual",
                    InvokeKind::Interface => "interface",
                };
                let receiver = receiver
                    .as_ref()
                    .map(|r| format!("{} ", self.operand(r)))
                    .unwrap_or_default();
                format!(
                    "{kind} {receiver}{}::{}({})",
                    method.owner,
                    method.name,
                    self.operands(args)
                )
            }
            Expr::Runtime { call, args } => {
                format!("runtime.{}({})", runtime_call_name(call), self.operands(args))
            }
            Expr::New(ty) => format!("new {ty}"),
            Expr::Cast { value, ty } => format!("({ty}) {}", self.operand(value)),
        }
    }

    fn operands(&self, ops: &[Operand]) -> String {
        ops.iter().map(|op| self.operand(op)).collect::<Vec<_>>().join(", ")
    }

    fn operand(&self, op: &Operand) -> String {
        match op {
            Operand::This => "this".into(),
            Operand::Param(index) => format!("@p{index}"),
            Operand::Local(id) => match self.body.local(*id) {
                Some(local) => format!("${}", local.name),
                None => format!("$<{}>", id.0),
            },
            Operand::Const(Const::Null) => "null".into(),
            Operand::Const(Const::Bool(b)) => b.to_string(),
            Operand::Const(Const::Int(i)) => i.to_string(),
            Operand::Const(Const::Str(s)) => format!("{s:?}"),
            Operand::Const(Const::Class(name)) => format!("class {name}"),
        }
    }
}

fn runtime_call_name(call: &RuntimeCall) -> String {
    match call {
        RuntimeCall::RegisterSelector => "register_selector".into(),
        RuntimeCall::ClassByType => "class_by_type".into(),
        RuntimeCall::Bind => "bind".into(),
        RuntimeCall::GetSuper => "get_super".into(),
        RuntimeCall::IsCustomClass => "is_custom_class".into(),
        RuntimeCall::UpdateStrongRef => "update_strong_ref".into(),
        RuntimeCall::UpdateStrongRefExtension => "update_strong_ref_extension".into(),
        RuntimeCall::GetPeerObject => "get_peer_object".into(),
        RuntimeCall::RetainFromCallback => "retain_from_callback".into(),
        RuntimeCall::SetHandle => "set_handle".into(),
        RuntimeCall::GetHandle => "get_handle".into(),
        RuntimeCall::AfterMarshaled => "after_marshaled".into(),
        RuntimeCall::InitObject => "init_object".into(),
        RuntimeCall::ForceSkipInit => "force_skip_init".into(),
        RuntimeCall::AssociateAlias => "associate_alias".into(),
        RuntimeCall::PublishDescriptor(symbol) => format!("publish_descriptor[{symbol}]"),
    }
}
