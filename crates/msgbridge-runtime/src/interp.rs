//! Interpreter for method bodies.

use msgbridge_model::{
    Annotation, Body, Condition, Const, Expr, FieldRef, InvokeKind, LocalId, MethodDecl, MethodRef,
    Operand, RuntimeCall, Stmt, TypeName, ValueType, CONSTRUCTOR,
};
use tracing::trace;

use crate::errors::{RuntimeError, RuntimeErrorKind, RuntimeResult};
use crate::runtime::Runtime;
use crate::value::{StrongRefUpdate, Value};

struct Frame {
    this: Option<Value>,
    params: Vec<Value>,
    locals: Vec<Value>,
}

enum Flow {
    Next,
    Return(Value),
}

impl Frame {
    fn operand(&self, operand: &Operand) -> RuntimeResult<Value> {
        let value = match operand {
            Operand::This => self.this.clone(),
            Operand::Param(index) => self.params.get(*index).cloned(),
            Operand::Local(id) => self.locals.get(id.0 as usize).cloned(),
            Operand::Const(constant) => Some(match constant {
                Const::Null => Value::Null,
                Const::Bool(value) => Value::Bool(*value),
                Const::Int(value) => Value::Int(*value),
                Const::Str(value) => Value::Str(value.clone()),
                Const::Class(name) => Value::Class(name.clone()),
            }),
        };
        value.ok_or_else(|| RuntimeErrorKind::BadOperand(format!("{operand:?}")).into())
    }

    fn set(&mut self, dst: LocalId, value: Value) -> RuntimeResult<()> {
        let slot = self
            .locals
            .get_mut(dst.0 as usize)
            .ok_or_else(|| RuntimeErrorKind::BadOperand(format!("local {}", dst.0)))?;
        *slot = value;
        Ok(())
    }
}

fn arg(args: &[Value], index: usize, call: &RuntimeCall) -> RuntimeResult<Value> {
    args.get(index)
        .cloned()
        .ok_or_else(|| RuntimeErrorKind::BadOperand(format!("{call:?} argument {index}")).into())
}

fn object_arg(args: &[Value], index: usize, call: &RuntimeCall) -> RuntimeResult<crate::ObjectId> {
    let value = arg(args, index, call)?;
    value
        .as_object()
        .ok_or_else(|| RuntimeError::type_mismatch("object", &value))
}

fn handle_arg(args: &[Value], index: usize, call: &RuntimeCall) -> RuntimeResult<u64> {
    let value = arg(args, index, call)?;
    value
        .as_int()
        .map(|handle| handle as u64)
        .ok_or_else(|| RuntimeError::type_mismatch("handle", &value))
}

fn class_arg(args: &[Value], index: usize, call: &RuntimeCall) -> RuntimeResult<TypeName> {
    match arg(args, index, call)? {
        Value::Class(name) | Value::Descriptor(name) => Ok(name),
        other => Err(RuntimeError::type_mismatch("class", &other)),
    }
}

impl Runtime {
    /// Run `method` of `owner` with `this` and `args`.
    pub(crate) fn execute(
        &self,
        owner: &TypeName,
        method: &MethodDecl,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        match &method.body {
            Some(body) => self.run_body(body, this, args),
            None if method.has_annotation(&Annotation::Bridge) => {
                let mut args = args.into_iter();
                let receiver = args.next().unwrap_or(Value::Null);
                let selector = match args.next() {
                    Some(Value::Selector(selector)) => selector,
                    Some(other) => return Err(RuntimeError::type_mismatch("selector", &other)),
                    None => return Err(RuntimeErrorKind::BadOperand(method.name.clone()).into()),
                };
                self.send(receiver, &selector, args.collect(), false)
            }
            None if method.is_constructor() => self.stub_constructor(this),
            None => self.plain_native(owner, method, this, args),
        }
    }

    /// A body-less member without a bridge: looked up in the native table under its own name.
    fn plain_native(
        &self,
        owner: &TypeName,
        method: &MethodDecl,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        let missing = || RuntimeErrorKind::NoImplementation(format!("{owner}::{}", method.name));
        let (receiver, handle) = match this {
            Some(Value::Object(id)) => (
                Value::Object(id),
                self.handle_of(id)
                    .ok_or_else(|| RuntimeErrorKind::NoHandle(id.to_string()))?,
            ),
            _ => (
                Value::Descriptor(owner.clone()),
                self.descriptor_handle(owner).unwrap_or(0),
            ),
        };
        let imp = self.native_imp(owner, &method.name).ok_or_else(missing)?;
        self.run_native(&imp, receiver, handle, args)
    }

    fn run_body(&self, body: &Body, this: Option<Value>, params: Vec<Value>) -> RuntimeResult<Value> {
        let mut frame = Frame {
            this,
            params,
            locals: vec![Value::Null; body.locals.len()],
        };
        match self.exec_block(&mut frame, &body.stmts)? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(Value::Null),
        }
    }

    fn exec_block(&self, frame: &mut Frame, stmts: &[Stmt]) -> RuntimeResult<Flow> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(frame, stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec(&self, frame: &mut Frame, stmt: &Stmt) -> RuntimeResult<Flow> {
        match stmt {
            Stmt::Assign { dst, value } => {
                let value = self.eval(frame, value)?;
                frame.set(*dst, value)?;
            }
            Stmt::Eval(expr) => {
                self.eval(frame, expr)?;
            }
            Stmt::SetField {
                target,
                field,
                value,
            } => {
                let value = frame.operand(value)?;
                let target = target.as_ref().map(|t| frame.operand(t)).transpose()?;
                self.set_field(target, field, value)?;
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let taken = match cond {
                    Condition::IsNull(operand) => frame.operand(operand)?.is_null(),
                    Condition::IsTrue(operand) => match frame.operand(operand)? {
                        Value::Bool(flag) => flag,
                        other => return Err(RuntimeError::type_mismatch("boolean", &other)),
                    },
                };
                let branch = if taken { then_branch } else { else_branch };
                return self.exec_block(frame, branch);
            }
            Stmt::Dispatch {
                custom_class,
                standard,
                ancestor,
            } => {
                let branch = match frame.operand(custom_class)? {
                    Value::Bool(true) => ancestor,
                    Value::Bool(false) => standard,
                    other => return Err(RuntimeError::type_mismatch("boolean", &other)),
                };
                return self.exec_block(frame, branch);
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(operand) => frame.operand(operand)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Throw { class, message } => {
                let kind = if *class == self.names().linkage_error {
                    RuntimeErrorKind::Linkage {
                        class: class.clone(),
                        message: message.clone(),
                    }
                } else {
                    RuntimeErrorKind::Thrown {
                        class: class.clone(),
                        message: message.clone(),
                    }
                };
                return Err(kind.into());
            }
        }
        Ok(Flow::Next)
    }

    fn eval(&self, frame: &Frame, expr: &Expr) -> RuntimeResult<Value> {
        match expr {
            Expr::Use(operand) => frame.operand(operand),
            Expr::GetField { target, field } => {
                let target = target.as_ref().map(|t| frame.operand(t)).transpose()?;
                self.get_field(target, field)
            }
            Expr::Invoke {
                kind,
                method,
                receiver,
                args,
            } => {
                let receiver = receiver.as_ref().map(|r| frame.operand(r)).transpose()?;
                let args = args
                    .iter()
                    .map(|a| frame.operand(a))
                    .collect::<RuntimeResult<Vec<_>>>()?;
                self.invoke(*kind, method, receiver, args)
            }
            Expr::Runtime { call, args } => {
                let args = args
                    .iter()
                    .map(|a| frame.operand(a))
                    .collect::<RuntimeResult<Vec<_>>>()?;
                self.runtime_call(call, &args)
            }
            Expr::New(class) => Ok(Value::Object(self.allocate(class)?)),
            Expr::Cast { value, ty } => {
                let value = frame.operand(value)?;
                self.cast(value, ty)
            }
        }
    }

    fn get_field(&self, target: Option<Value>, field: &FieldRef) -> RuntimeResult<Value> {
        match target {
            None => {
                self.ensure_initialized(&field.owner)?;
                Ok(self
                    .static_field(&field.owner, &field.name)
                    .unwrap_or(Value::Null))
            }
            Some(Value::Object(id)) => Ok(self.field(id, &field.name).unwrap_or(Value::Null)),
            Some(other) => Err(RuntimeError::type_mismatch("object", &other)),
        }
    }

    fn set_field(&self, target: Option<Value>, field: &FieldRef, value: Value) -> RuntimeResult<()> {
        match target {
            None => {
                self.ensure_initialized(&field.owner)?;
                self.statics
                    .insert((field.owner.clone(), field.name.clone()), value);
                Ok(())
            }
            Some(Value::Object(id)) => {
                let mut object = self
                    .objects
                    .get_mut(&id)
                    .ok_or_else(|| RuntimeErrorKind::BadOperand(id.to_string()))?;
                object.fields.insert(field.name.clone(), value);
                Ok(())
            }
            Some(other) => Err(RuntimeError::type_mismatch("object", &other)),
        }
    }

    fn cast(&self, value: Value, ty: &ValueType) -> RuntimeResult<Value> {
        if let (Value::Object(id), ValueType::Object(target)) = (&value, ty) {
            let class = self.class_of(*id)?;
            if !self.class_path.is_assignable(&class, target) {
                return Err(RuntimeErrorKind::ClassCast {
                    value: format!("{value} ({class})"),
                    ty: ty.to_string(),
                }
                .into());
            }
        }
        Ok(value)
    }

    /// Invoke `method`, resolving virtual calls against the receiver's runtime class.
    pub(crate) fn invoke(
        &self,
        kind: InvokeKind,
        method: &MethodRef,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        if method.owner == self.names().trampolines {
            return self.trampoline(method, args);
        }
        let start = match (kind, &receiver) {
            (InvokeKind::Virtual | InvokeKind::Interface, Some(Value::Object(id))) => self.class_of(*id)?,
            (InvokeKind::Virtual | InvokeKind::Interface, _) => {
                return Err(RuntimeErrorKind::NullReceiver(format!("{}::{}", method.owner, method.name)).into());
            }
            (InvokeKind::Static | InvokeKind::Special, _) => method.owner.clone(),
        };
        let found = self
            .class_path
            .find_method_in_hierarchy(&start, &method.name, &method.params, &method.ret);
        let Some((owner, decl)) = found else {
            if method.name == CONSTRUCTOR {
                return self.stub_constructor(receiver);
            }
            return Err(RuntimeErrorKind::NoSuchMethod {
                owner: start,
                method: method.name.clone(),
            }
            .into());
        };
        if decl.modifiers.is_static {
            self.ensure_initialized(&owner.name)?;
        }
        trace!(owner = %owner.name, method = %decl.name, "invoke");
        self.execute(&owner.name, decl, receiver, args)
    }

    fn runtime_call(&self, call: &RuntimeCall, args: &[Value]) -> RuntimeResult<Value> {
        match call {
            RuntimeCall::RegisterSelector => match arg(args, 0, call)? {
                Value::Str(name) => Ok(self.register_selector(&name)),
                other => Err(RuntimeError::type_mismatch("string", &other)),
            },
            RuntimeCall::ClassByType => Ok(self.class_descriptor(&class_arg(args, 0, call)?)),
            RuntimeCall::Bind => {
                self.bind(&class_arg(args, 0, call)?)?;
                Ok(Value::Null)
            }
            RuntimeCall::GetSuper => Ok(Value::Super(object_arg(args, 0, call)?)),
            RuntimeCall::IsCustomClass => {
                Ok(Value::Bool(self.is_custom_instance(object_arg(args, 0, call)?)?))
            }
            RuntimeCall::UpdateStrongRef | RuntimeCall::UpdateStrongRefExtension => {
                self.record_strong_ref(StrongRefUpdate {
                    owner: arg(args, 0, call)?,
                    before: arg(args, 1, call)?,
                    after: arg(args, 2, call)?,
                    extension: *call == RuntimeCall::UpdateStrongRefExtension,
                });
                Ok(Value::Null)
            }
            RuntimeCall::GetPeerObject => Ok(self
                .peer(handle_arg(args, 0, call)?)
                .map_or(Value::Null, Value::Object)),
            RuntimeCall::RetainFromCallback => {
                self.retain(handle_arg(args, 0, call)?);
                Ok(Value::Null)
            }
            RuntimeCall::SetHandle | RuntimeCall::InitObject => {
                self.link(object_arg(args, 0, call)?, handle_arg(args, 1, call)?)?;
                Ok(Value::Null)
            }
            RuntimeCall::GetHandle => match arg(args, 0, call)? {
                Value::Object(id) => self
                    .handle_of(id)
                    .map(|handle| Value::Int(handle as i64))
                    .ok_or_else(|| RuntimeErrorKind::NoHandle(id.to_string()).into()),
                Value::Descriptor(class) => self
                    .descriptor_handle(&class)
                    .map(|handle| Value::Int(handle as i64))
                    .ok_or_else(|| RuntimeErrorKind::NoHandle(class.to_string()).into()),
                other => Err(RuntimeError::type_mismatch("object", &other)),
            },
            RuntimeCall::AfterMarshaled => Ok(Value::Null),
            RuntimeCall::ForceSkipInit => {
                self.force_skip_init(object_arg(args, 0, call)?)?;
                Ok(Value::Null)
            }
            RuntimeCall::AssociateAlias => {
                self.associate_alias(&class_arg(args, 0, call)?, handle_arg(args, 1, call)?);
                Ok(Value::Null)
            }
            RuntimeCall::PublishDescriptor(symbol) => {
                self.publish_descriptor(symbol, handle_arg(args, 0, call)?)
            }
        }
    }
}
