//! Structured body IR for declared and synthesized methods.
//!
//! The member transform only emits straight-line code with a few two-way branches, so
//! statements nest instead of jumping.
//!
//! ```text
//! $sel = static T.$sel$setTitle$
//! $customClass = runtime.is_custom_class(this)
//! dispatch $customClass {
//!     standard:
//!         static T.$m$setTitle$(this, $sel, @p0)
//!     ancestor:
//!         $super = runtime.get_super(this)
//!         static T.$m$super$setTitle$($super, $sel, @p0)
//! }
//! return
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{TypeName, ValueType};

/// Index of a local in [`Body::locals`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub u32);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Local {
    pub name: String,
    pub ty: ValueType,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub locals: Vec<Local>,
    #[serde(default)]
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Const {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Class(TypeName),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    This,
    Param(usize),
    Local(LocalId),
    Const(Const),
}

impl Operand {
    pub fn str(value: impl Into<String>) -> Self {
        Operand::Const(Const::Str(value.into()))
    }

    pub fn class(name: TypeName) -> Self {
        Operand::Const(Const::Class(name))
    }

    pub fn int(value: i64) -> Self {
        Operand::Const(Const::Int(value))
    }
}

impl From<LocalId> for Operand {
    fn from(local: LocalId) -> Self {
        Operand::Local(local)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeKind {
    Static,
    /// Direct, non-virtual call of exactly the referenced method.
    Special,
    Virtual,
    Interface,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub owner: TypeName,
    pub name: String,
    #[serde(default)]
    pub params: Vec<ValueType>,
    pub ret: ValueType,
}

impl MethodRef {
    pub fn new(
        owner: TypeName,
        name: impl Into<String>,
        params: Vec<ValueType>,
        ret: ValueType,
    ) -> Self {
        MethodRef {
            owner,
            name: name.into(),
            params,
            ret,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub owner: TypeName,
    pub name: String,
    pub ty: ValueType,
    #[serde(default)]
    pub is_static: bool,
}

/// Primitives provided by the foreign-runtime support library.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeCall {
    /// `(name: String) -> Selector`
    RegisterSelector,
    /// `(class constant) -> ClassDescriptor`
    ClassByType,
    /// `(class constant)`: registers callbacks of the class with the runtime.
    Bind,
    /// `(object) -> SuperRef` for ancestor-aware sends.
    GetSuper,
    /// `(object) -> boolean`: the per-instance dynamically-subclassed flag.
    IsCustomClass,
    /// `(target, before, after)`
    UpdateStrongRef,
    /// `(receiver, before, after)` for extension members.
    UpdateStrongRefExtension,
    /// `(handle) -> object or null`
    GetPeerObject,
    /// `(handle)`: keep the managed peer alive while native code holds the handle.
    RetainFromCallback,
    /// `(object, handle)`: links handle and peer.
    SetHandle,
    /// `(object) -> handle`
    GetHandle,
    /// `(object, flags)`: post-construction hook.
    AfterMarshaled,
    /// `(object, handle)`: associates an object created through a plain constructor.
    InitObject,
    /// `(object)`: tells the default constructor not to allocate a native part.
    ForceSkipInit,
    /// `(class descriptor, handle)`
    AssociateAlias,
    /// `(class handle) -> pointer`: copies the class descriptor into the named symbol.
    PublishDescriptor(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Use(Operand),
    GetField {
        target: Option<Operand>,
        field: FieldRef,
    },
    Invoke {
        kind: InvokeKind,
        method: MethodRef,
        receiver: Option<Operand>,
        args: Vec<Operand>,
    },
    Runtime {
        call: RuntimeCall,
        args: Vec<Operand>,
    },
    New(TypeName),
    Cast {
        value: Operand,
        ty: ValueType,
    },
}

impl Expr {
    pub fn invoke_static(method: MethodRef, args: Vec<Operand>) -> Self {
        Expr::Invoke {
            kind: InvokeKind::Static,
            method,
            receiver: None,
            args,
        }
    }

    pub fn invoke(kind: InvokeKind, method: MethodRef, receiver: Operand, args: Vec<Operand>) -> Self {
        Expr::Invoke {
            kind,
            method,
            receiver: Some(receiver),
            args,
        }
    }

    pub fn runtime(call: RuntimeCall, args: Vec<Operand>) -> Self {
        Expr::Runtime { call, args }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    IsNull(Operand),
    IsTrue(Operand),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Assign {
        dst: LocalId,
        value: Expr,
    },
    Eval(Expr),
    SetField {
        target: Option<Operand>,
        field: FieldRef,
        value: Operand,
    },
    If {
        cond: Condition,
        then_branch: Vec<Stmt>,
        #[serde(default)]
        else_branch: Vec<Stmt>,
    },
    /// Two-state send: `standard` when the flag is false, `ancestor` when it is true.
    Dispatch {
        custom_class: Operand,
        standard: Vec<Stmt>,
        ancestor: Vec<Stmt>,
    },
    Return(Option<Operand>),
    Throw {
        class: TypeName,
        message: String,
    },
}

impl Body {
    pub fn local(&self, id: LocalId) -> Option<&Local> {
        self.locals.get(id.0 as usize)
    }

    pub fn add_local(&mut self, name: impl Into<String>, ty: ValueType) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(Local {
            name: name.into(),
            ty,
        });
        id
    }

    /// Insert statements ahead of a trailing `return`, or append them.
    pub fn insert_before_return(&mut self, stmts: impl IntoIterator<Item = Stmt>) {
        let at = match self.stmts.last() {
            Some(Stmt::Return(None)) => self.stmts.len() - 1,
            _ => self.stmts.len(),
        };
        self.stmts.splice(at..at, stmts);
    }

    /// Visit every statement, including nested branches, in program order.
    pub fn walk(&self, f: &mut impl FnMut(&Stmt)) {
        fn walk_block(stmts: &[Stmt], f: &mut impl FnMut(&Stmt)) {
            for stmt in stmts {
                f(stmt);
                match stmt {
                    Stmt::If {
                        then_branch,
                        else_branch,
                        ..
                    } => {
                        walk_block(then_branch, f);
                        walk_block(else_branch, f);
                    }
                    Stmt::Dispatch {
                        standard, ancestor, ..
                    } => {
                        walk_block(standard, f);
                        walk_block(ancestor, f);
                    }
                    _ => {}
                }
            }
        }
        walk_block(&self.stmts, f);
    }
}

/// Incremental construction of a [`Body`].
#[derive(Debug, Default)]
pub struct BodyBuilder {
    locals: Vec<Local>,
    stmts: Vec<Stmt>,
}

impl BodyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local(&mut self, name: impl Into<String>, ty: ValueType) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(Local {
            name: name.into(),
            ty,
        });
        id
    }

    pub fn push(&mut self, stmt: Stmt) -> &mut Self {
        self.stmts.push(stmt);
        self
    }

    pub fn assign(&mut self, dst: LocalId, value: Expr) -> &mut Self {
        self.push(Stmt::Assign { dst, value })
    }

    pub fn eval(&mut self, expr: Expr) -> &mut Self {
        self.push(Stmt::Eval(expr))
    }

    /// Assign when a destination exists, otherwise evaluate for effect.
    pub fn assign_or_eval(&mut self, dst: Option<LocalId>, value: Expr) -> &mut Self {
        match dst {
            Some(dst) => self.assign(dst, value),
            None => self.eval(value),
        }
    }

    pub fn ret(&mut self, value: Option<Operand>) -> &mut Self {
        self.push(Stmt::Return(value))
    }

    /// Collect the statements emitted by `f` into a separate block.
    pub fn block(&mut self, f: impl FnOnce(&mut Self)) -> Vec<Stmt> {
        let saved = std::mem::take(&mut self.stmts);
        f(self);
        std::mem::replace(&mut self.stmts, saved)
    }

    pub fn finish(self) -> Body {
        Body {
            locals: self.locals,
            stmts: self.stmts,
        }
    }
}
