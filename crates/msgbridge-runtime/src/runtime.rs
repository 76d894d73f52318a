//! The stub foreign runtime: native method tables, peers, selectors and published descriptors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use dashmap::{DashMap, DashSet};
use msgbridge_core::{PointerWidth, TargetInfo};
use msgbridge_model::{
    Annotation, ClassPath, DescriptorExport, InvokeKind, MethodRef, RuntimeNames, TypeDecl, TypeName,
    ValueType,
};
use msgbridge_object::{DescriptorLayout, CLASS_DESCRIPTOR_V1};
use target_lexicon::Endianness;
use tracing::{debug, trace};

use crate::errors::{RuntimeErrorKind, RuntimeResult};
use crate::value::{NativeCall, NativeReceiver, ObjectId, StrongRefUpdate, Value};

/// Suffix of trampolines that test the custom-class flag themselves.
const INSTANCE_SUFFIX: &str = "_instance";

const FIRST_HANDLE: u64 = 0x1000;
const HANDLE_STRIDE: u64 = 0x10;

/// Native implementation of a selector on a native class.
#[derive(Clone, Debug, PartialEq)]
pub enum NativeImp {
    /// Answers every send with a fixed value.
    Returns(Value),
    /// Answers with the receiver's handle, like the `init` family.
    ReturnsHandle,
    /// Per-instance storage: sends without arguments read it, sends with one argument write it.
    Property(String),
    /// Sends another selector to the receiver, reaching managed overrides through their callbacks.
    Callback(String),
}

#[derive(Debug)]
pub(crate) struct ManagedObject {
    pub(crate) class: TypeName,
    pub(crate) fields: HashMap<String, Value>,
    pub(crate) handle: Option<u64>,
    pub(crate) skip_init: bool,
}

pub struct Runtime {
    pub(crate) class_path: ClassPath,
    layout: DescriptorLayout,
    pointer_width: PointerWidth,
    endianness: Endianness,
    natives: DashMap<(TypeName, String), NativeImp>,
    /// Bound callbacks by class, selector and whether they answer class messages.
    callbacks: DashMap<(TypeName, String, bool), MethodRef>,
    initialized: DashSet<TypeName>,
    pub(crate) statics: DashMap<(TypeName, String), Value>,
    pub(crate) objects: DashMap<ObjectId, ManagedObject>,
    peers: DashMap<u64, ObjectId>,
    native_props: DashMap<(u64, String), Value>,
    descriptors: DashMap<TypeName, u64>,
    aliases: DashMap<u64, TypeName>,
    selectors: DashSet<String>,
    retained: DashSet<u64>,
    exports: DashMap<String, Vec<u8>>,
    strong_refs: Mutex<Vec<StrongRefUpdate>>,
    calls: Mutex<Vec<NativeCall>>,
    next_object: AtomicU64,
    next_handle: AtomicU64,
}

impl Runtime {
    /// A runtime executing `class_path`, which should already be transformed.
    pub fn new(class_path: ClassPath) -> Self {
        Runtime {
            class_path,
            layout: CLASS_DESCRIPTOR_V1,
            pointer_width: PointerWidth::U64,
            endianness: Endianness::Little,
            natives: DashMap::new(),
            callbacks: DashMap::new(),
            initialized: DashSet::new(),
            statics: DashMap::new(),
            objects: DashMap::new(),
            peers: DashMap::new(),
            native_props: DashMap::new(),
            descriptors: DashMap::new(),
            aliases: DashMap::new(),
            selectors: DashSet::new(),
            retained: DashSet::new(),
            exports: DashMap::new(),
            strong_refs: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            next_object: AtomicU64::new(1),
            next_handle: AtomicU64::new(FIRST_HANDLE),
        }
    }

    /// Use the pointer width and byte order of `target` for published descriptors.
    pub fn with_target(mut self, target: &TargetInfo) -> Self {
        self.pointer_width = target.pointer_width;
        self.endianness = target.endianness;
        self
    }

    pub fn class_path(&self) -> &ClassPath {
        &self.class_path
    }

    pub(crate) fn names(&self) -> &RuntimeNames {
        self.class_path.runtime()
    }

    pub fn register_native(&self, class: impl Into<TypeName>, selector: impl Into<String>, imp: NativeImp) {
        self.natives.insert((class.into(), selector.into()), imp);
    }

    /// Reserve zero-filled storage for every exported descriptor symbol.
    pub fn declare_exports(&self, exports: &[DescriptorExport]) {
        let size = self.layout.size(self.pointer_width);
        for export in exports {
            self.exports.insert(export.symbol.clone(), vec![0; size]);
        }
    }

    /// Current contents of an exported descriptor symbol.
    pub fn export(&self, symbol: &str) -> Option<Vec<u8>> {
        self.exports.get(symbol).map(|bytes| bytes.clone())
    }

    pub fn descriptor_handle(&self, class: &TypeName) -> Option<u64> {
        self.descriptors.get(class).map(|handle| *handle)
    }

    pub fn alias(&self, handle: u64) -> Option<TypeName> {
        self.aliases.get(&handle).map(|class| class.clone())
    }

    /// Registered selectors in sorted order.
    pub fn selectors(&self) -> Vec<String> {
        let mut selectors: Vec<String> = self.selectors.iter().map(|s| s.clone()).collect();
        selectors.sort();
        selectors
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Drain the call log.
    pub fn take_calls(&self) -> Vec<NativeCall> {
        std::mem::take(&mut *self.calls.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn strong_refs(&self) -> Vec<StrongRefUpdate> {
        self.strong_refs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_retained(&self, handle: u64) -> bool {
        self.retained.contains(&handle)
    }

    /// Managed peer linked to `handle`.
    pub fn peer(&self, handle: u64) -> Option<ObjectId> {
        self.peers.get(&handle).map(|id| *id)
    }

    pub fn handle_of(&self, id: ObjectId) -> Option<u64> {
        self.objects.get(&id).and_then(|object| object.handle)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn field(&self, id: ObjectId, name: &str) -> Option<Value> {
        self.objects.get(&id).and_then(|object| object.fields.get(name).cloned())
    }

    pub fn static_field(&self, class: &TypeName, name: &str) -> Option<Value> {
        self.statics.get(&(class.clone(), name.to_owned())).map(|v| v.clone())
    }

    pub fn class_of(&self, id: ObjectId) -> RuntimeResult<TypeName> {
        self.objects
            .get(&id)
            .map(|object| object.class.clone())
            .ok_or_else(|| RuntimeErrorKind::BadOperand(id.to_string()).into())
    }

    pub(crate) fn decl(&self, name: &TypeName) -> RuntimeResult<&TypeDecl> {
        self.class_path
            .get(name)
            .ok_or_else(|| RuntimeErrorKind::UnknownType(name.clone()).into())
    }

    /// Run the static initializer of `class` and its superclasses once.
    pub fn ensure_initialized(&self, class: &TypeName) -> RuntimeResult<()> {
        if !self.initialized.insert(class.clone()) {
            return Ok(());
        }
        let decl = self.decl(class)?;
        if let Some(superclass) = &decl.superclass {
            self.ensure_initialized(superclass)?;
        }
        if let Some(clinit) = decl.methods.iter().find(|m| m.is_static_initializer()) {
            trace!(%class, "initializing");
            self.execute(class, clinit, None, Vec::new())?;
        }
        Ok(())
    }

    pub(crate) fn allocate(&self, class: &TypeName) -> RuntimeResult<ObjectId> {
        self.ensure_initialized(class)?;
        let id = ObjectId(self.next_object.fetch_add(1, Ordering::Relaxed));
        self.objects.insert(
            id,
            ManagedObject {
                class: class.clone(),
                fields: HashMap::new(),
                handle: None,
                skip_init: false,
            },
        );
        Ok(id)
    }

    fn next_handle(&self) -> u64 {
        self.next_handle.fetch_add(HANDLE_STRIDE, Ordering::Relaxed)
    }

    /// Allocate a native instance with no managed peer, as native code would.
    pub fn alloc_native(&self) -> u64 {
        self.next_handle()
    }

    pub(crate) fn link(&self, id: ObjectId, handle: u64) -> RuntimeResult<()> {
        let mut object = self
            .objects
            .get_mut(&id)
            .ok_or_else(|| RuntimeErrorKind::BadOperand(id.to_string()))?;
        object.handle = Some(handle);
        drop(object);
        self.peers.insert(handle, id);
        Ok(())
    }

    pub(crate) fn force_skip_init(&self, id: ObjectId) -> RuntimeResult<()> {
        let mut object = self
            .objects
            .get_mut(&id)
            .ok_or_else(|| RuntimeErrorKind::BadOperand(id.to_string()))?;
        object.skip_init = true;
        Ok(())
    }

    /// Body-less constructor: gives the object a native part unless it already has one or was
    /// told to skip it.
    pub(crate) fn stub_constructor(&self, this: Option<Value>) -> RuntimeResult<Value> {
        let Some(Value::Object(id)) = this else {
            return Err(RuntimeErrorKind::NullReceiver("<init>".into()).into());
        };
        let needs_handle = self
            .objects
            .get(&id)
            .is_some_and(|object| object.handle.is_none() && !object.skip_init);
        if needs_handle {
            let handle = self.next_handle();
            self.link(id, handle)?;
        }
        Ok(Value::Null)
    }

    /// Whether the object's class is a managed subclass the runtime dispatches into.
    pub fn is_custom_instance(&self, id: ObjectId) -> RuntimeResult<bool> {
        let class = self.class_of(id)?;
        let decl = self.decl(&class)?;
        Ok(!decl.is_native_class()
            && !decl.is_protocol_proxy()
            && self.class_path.is_assignable(&class, &self.names().native_object))
    }

    /// Register the callbacks of `class` under their bound selectors.
    pub(crate) fn bind(&self, class: &TypeName) -> RuntimeResult<()> {
        let decl = self.decl(class)?;
        let class_receiver = ValueType::Object(self.names().class.clone());
        let mut count = 0;
        for method in &decl.methods {
            if !method.has_annotation(&Annotation::Callback) {
                continue;
            }
            if let Some(selector) = method.bound_selector() {
                let target = MethodRef::new(
                    class.clone(),
                    method.name.clone(),
                    method.param_types(),
                    method.ret.clone(),
                );
                let is_static = method.params.first().is_some_and(|p| p.ty == class_receiver);
                self.callbacks
                    .insert((class.clone(), selector.to_owned(), is_static), target);
                count += 1;
            }
        }
        debug!(%class, callbacks = count, "bound class");
        Ok(())
    }

    pub(crate) fn register_selector(&self, name: &str) -> Value {
        self.selectors.insert(name.to_owned());
        Value::Selector(name.to_owned())
    }

    pub(crate) fn class_descriptor(&self, class: &TypeName) -> Value {
        self.descriptors
            .entry(class.clone())
            .or_insert_with(|| self.next_handle.fetch_add(HANDLE_STRIDE, Ordering::Relaxed));
        Value::Descriptor(class.clone())
    }

    pub(crate) fn associate_alias(&self, class: &TypeName, handle: u64) {
        self.aliases.insert(handle, class.clone());
    }

    pub(crate) fn retain(&self, handle: u64) {
        self.retained.insert(handle);
    }

    pub(crate) fn record_strong_ref(&self, update: StrongRefUpdate) {
        trace!(owner = %update.owner, before = %update.before, after = %update.after, "strong ref update");
        self.strong_refs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(update);
    }

    /// Copy the live descriptor behind `handle` into the exported `symbol`.
    pub(crate) fn publish_descriptor(&self, symbol: &str, handle: u64) -> RuntimeResult<Value> {
        let class = self
            .descriptors
            .iter()
            .find(|entry| *entry.value() == handle)
            .map(|entry| entry.key().clone())
            .ok_or_else(|| RuntimeErrorKind::BadOperand(format!("descriptor handle {handle:#x}")))?;
        let superclass = self
            .decl(&class)?
            .superclass
            .clone()
            .map_or(0, |superclass| {
                self.class_descriptor(&superclass);
                self.descriptor_handle(&superclass).unwrap_or(0)
            });
        let words: Vec<u64> = self
            .layout
            .fields
            .iter()
            .map(|field| match *field {
                "isa" => handle,
                "superclass" => superclass,
                _ => 0,
            })
            .collect();
        let live = self.layout.encode(&words, self.pointer_width, self.endianness)?;
        let mut storage = self
            .exports
            .get_mut(symbol)
            .ok_or_else(|| RuntimeErrorKind::UnknownSymbol(symbol.to_owned()))?;
        self.layout
            .copy_descriptor(self.pointer_width, &live, storage.as_mut_slice())?;
        debug!(%class, %symbol, "published descriptor");
        Ok(Value::Int(handle as i64))
    }

    /// Callback bound to `selector` on `class` or its nearest ancestor, for class or instance messages.
    pub fn bound_callback(&self, class: &TypeName, selector: &str, is_static: bool) -> Option<MethodRef> {
        self.class_path
            .get(class)
            .into_iter()
            .chain(self.class_path.superclasses(class))
            .find_map(|decl| {
                self.callbacks
                    .get(&(decl.name.clone(), selector.to_owned(), is_static))
                    .map(|callback| callback.clone())
            })
    }

    pub(crate) fn native_imp(&self, class: &TypeName, selector: &str) -> Option<NativeImp> {
        self.class_path
            .get(class)
            .into_iter()
            .chain(self.class_path.superclasses(class))
            .find_map(|decl| {
                self.natives
                    .get(&(decl.name.clone(), selector.to_owned()))
                    .map(|imp| imp.clone())
            })
    }

    fn log_call(&self, call: NativeCall) {
        trace!(class = %call.class, selector = %call.selector, receiver = %call.receiver, via_super = call.via_super, "native send");
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Deliver a message to the native side.
    ///
    /// Custom-class instances reach their bound callbacks unless the send goes through a super
    /// reference, in which case only native implementations are considered.
    pub(crate) fn send(
        &self,
        receiver: Value,
        selector: &str,
        args: Vec<Value>,
        via_super: bool,
    ) -> RuntimeResult<Value> {
        let (id, via_super) = match receiver {
            Value::Null => return Ok(Value::Null),
            Value::Super(id) => (id, true),
            Value::Object(id) => (id, via_super),
            Value::Descriptor(class) => return self.send_to_class(class, selector, args),
            other => return Err(crate::RuntimeError::type_mismatch("message receiver", &other)),
        };
        let class = self.class_of(id)?;
        let handle = self
            .handle_of(id)
            .ok_or_else(|| RuntimeErrorKind::NoHandle(id.to_string()))?;
        self.log_call(NativeCall {
            class: class.clone(),
            selector: selector.to_owned(),
            receiver: NativeReceiver::Instance(handle),
            args: args.clone(),
            via_super,
        });

        if !via_super {
            if let Some(callback) = self.bound_callback(&class, selector, false) {
                let mut callback_args = vec![Value::Object(id), Value::Selector(selector.to_owned())];
                callback_args.extend(args);
                return self.invoke(InvokeKind::Static, &callback, None, callback_args);
            }
        }
        let imp = self.native_imp(&class, selector).ok_or_else(|| {
            RuntimeErrorKind::UnrecognizedSelector {
                class: class.clone(),
                selector: selector.to_owned(),
            }
        })?;
        self.run_native(&imp, Value::Object(id), handle, args)
    }

    fn send_to_class(&self, class: TypeName, selector: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        self.log_call(NativeCall {
            class: class.clone(),
            selector: selector.to_owned(),
            receiver: NativeReceiver::Class(class.clone()),
            args: args.clone(),
            via_super: false,
        });
        let handle = self.descriptor_handle(&class).unwrap_or(0);
        let imp = self.native_imp(&class, selector).ok_or_else(|| {
            RuntimeErrorKind::UnrecognizedSelector {
                class: class.clone(),
                selector: selector.to_owned(),
            }
        })?;
        self.run_native(&imp, Value::Descriptor(class), handle, args)
    }

    pub(crate) fn run_native(
        &self,
        imp: &NativeImp,
        receiver: Value,
        handle: u64,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        match imp {
            NativeImp::Returns(value) => Ok(value.clone()),
            NativeImp::ReturnsHandle => Ok(Value::Int(handle as i64)),
            NativeImp::Property(name) => {
                let key = (handle, name.clone());
                match args.into_iter().next() {
                    Some(value) => {
                        self.native_props.insert(key, value);
                        Ok(Value::Null)
                    }
                    None => Ok(self
                        .native_props
                        .get(&key)
                        .map_or(Value::Null, |value| value.clone())),
                }
            }
            NativeImp::Callback(selector) => self.send(receiver, selector, args, false),
        }
    }

    /// Shared `objc_msgSend`-family trampolines.
    pub(crate) fn trampoline(&self, method: &MethodRef, args: Vec<Value>) -> RuntimeResult<Value> {
        let via_super = method.name.contains("msgSendSuper");
        let instance = method.name.ends_with(INSTANCE_SUFFIX);
        let mut args = args.into_iter();
        let receiver = args.next().unwrap_or(Value::Null);
        let selector = match args.next() {
            Some(Value::Selector(selector)) => selector,
            Some(other) => return Err(crate::RuntimeError::type_mismatch("selector", &other)),
            None => return Err(RuntimeErrorKind::BadOperand(method.name.clone()).into()),
        };
        let receiver = match receiver {
            Value::Object(id) if instance && !via_super => {
                if self.is_custom_instance(id)? {
                    Value::Super(id)
                } else {
                    Value::Object(id)
                }
            }
            receiver => receiver,
        };
        trace!(trampoline = %method.name, %selector, "generic send");
        self.send(receiver, &selector, args.collect(), via_super)
    }

    /// Send `selector` to a managed object as native code would.
    pub fn send_message(&self, receiver: ObjectId, selector: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        self.send(Value::Object(receiver), selector, args, false)
    }

    /// Allocate and construct an instance through its constructor taking `args.len()` arguments.
    pub fn instantiate(&self, class: &TypeName, args: Vec<Value>) -> RuntimeResult<ObjectId> {
        let id = self.allocate(class)?;
        let ctor = self
            .decl(class)?
            .constructors()
            .find(|ctor| ctor.params.len() == args.len())
            .map(|ctor| MethodRef::new(class.clone(), ctor.name.clone(), ctor.param_types(), ctor.ret.clone()));
        match ctor {
            Some(ctor) => {
                self.invoke(InvokeKind::Special, &ctor, Some(Value::Object(id)), args)?;
            }
            None if args.is_empty() => {
                self.stub_constructor(Some(Value::Object(id)))?;
            }
            None => {
                return Err(RuntimeErrorKind::NoSuchMethod {
                    owner: class.clone(),
                    method: format!("<init>/{}", args.len()),
                }
                .into());
            }
        }
        Ok(id)
    }

    /// Call the instance method `name` taking `args.len()` arguments, dispatching virtually.
    pub fn call(&self, receiver: ObjectId, name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let class = self.class_of(receiver)?;
        let method = self.method_by_arity(&class, name, args.len())?;
        self.invoke(InvokeKind::Virtual, &method, Some(Value::Object(receiver)), args)
    }

    pub fn call_static(&self, class: &TypeName, name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let method = self.method_by_arity(class, name, args.len())?;
        self.invoke(InvokeKind::Static, &method, None, args)
    }

    /// Native code initializing the instance at `handle` with an init selector of `class`.
    pub fn init_from_native(
        &self,
        class: &TypeName,
        handle: u64,
        selector: &str,
        args: Vec<Value>,
    ) -> RuntimeResult<u64> {
        self.ensure_initialized(class)?;
        let callback = self.bound_callback(class, selector, false).ok_or_else(|| {
            RuntimeErrorKind::UnrecognizedSelector {
                class: class.clone(),
                selector: selector.to_owned(),
            }
        })?;
        let mut callback_args = vec![Value::Int(handle as i64), Value::Selector(selector.to_owned())];
        callback_args.extend(args);
        let result = self.invoke(InvokeKind::Static, &callback, None, callback_args)?;
        result
            .as_int()
            .map(|handle| handle as u64)
            .ok_or_else(|| crate::RuntimeError::type_mismatch("handle", &result))
    }

    fn method_by_arity(&self, class: &TypeName, name: &str, arity: usize) -> RuntimeResult<MethodRef> {
        let first = self.decl(class)?;
        std::iter::once(first)
            .chain(self.class_path.superclasses(class))
            .find_map(|decl| {
                decl.methods
                    .iter()
                    .find(|m| m.name == name && m.params.len() == arity)
                    .map(|m| MethodRef::new(decl.name.clone(), m.name.clone(), m.param_types(), m.ret.clone()))
            })
            .ok_or_else(|| {
                RuntimeErrorKind::NoSuchMethod {
                    owner: class.clone(),
                    method: format!("{name}/{arity}"),
                }
                .into()
            })
    }
}
