//! Static-initializer registration: runtime binding, the class descriptor field, descriptor
//! publication and interned selectors.
//!
//! Everything is inserted ahead of the initializer's final `return`, in this order:
//!
//! ```text
//! runtime.bind(class app.MyView)
//! $objCClass = runtime.class_by_type(class app.MyView)
//! app.MyView.$class = $objCClass
//! $objCClassHandle = runtime.get_handle($objCClass)
//! $objCClassHandle = static app.MyView::$publishClass($objCClassHandle)
//! runtime.associate_alias($objCClass, $objCClassHandle)
//! $sel = runtime.register_selector("draw")
//! app.MyView.$sel$draw = $sel
//! return
//! ```

use std::collections::BTreeSet;

use msgbridge_model::{
    Annotation, BodyBuilder, DescriptorExport, Expr, FieldDecl, FieldRef, MethodDecl, MethodRef,
    Modifiers, Operand, Param, RuntimeCall, Stmt, TypeDecl, ValueAttrs, ValueType, Visibility,
};
use tracing::debug;

use crate::bridge::{class_field, CLASS_FIELD};
use crate::context::TransformContext;
use crate::selector::selector_field_name;

/// Name of the synthesized descriptor publication method.
pub const PUBLISH_METHOD: &str = "$publishClass";

fn constant_field(name: String, ty: ValueType) -> FieldDecl {
    FieldDecl::new(
        name,
        ty,
        Modifiers {
            visibility: Visibility::Private,
            is_static: true,
            is_final: true,
            ..Default::default()
        },
    )
}

/// Bind the type's callbacks at class initialization, unless the initializer already does.
pub fn add_bind_call(decl: &mut TypeDecl) {
    let class = Operand::class(decl.name.clone());
    let body = decl.static_initializer_body();
    let mut bound = false;
    body.walk(&mut |stmt| {
        if let Stmt::Eval(Expr::Runtime {
            call: RuntimeCall::Bind,
            args,
        }) = stmt
        {
            bound |= args.first().is_none_or(|arg| *arg == class);
        }
    });
    if !bound {
        body.insert_before_return([Stmt::Eval(Expr::runtime(RuntimeCall::Bind, vec![class]))]);
    }
}

/// Add the `$class` descriptor field, and for exported custom classes the publication of the
/// descriptor under its well-known symbol.
pub fn add_class_field(
    ctx: &TransformContext<'_>,
    decl: &mut TypeDecl,
    export: bool,
) -> Option<DescriptorExport> {
    let field = class_field(ctx, decl);
    if !decl.has_field(CLASS_FIELD) {
        decl.fields.push(constant_field(CLASS_FIELD.to_owned(), ctx.class_type()));
    }
    let export = export.then(|| DescriptorExport::for_type(decl));
    let publish = export.as_ref().map(|export| publish_method(decl, &export.symbol));
    if let Some(method) = &publish {
        decl.methods.push(method.clone());
    }

    let decl_name = decl.name.clone();
    let class = Operand::class(decl_name.clone());
    let body = decl.static_initializer_body();
    let descriptor = body.add_local("objCClass", ctx.class_type());
    let mut stmts = vec![
        Stmt::Assign {
            dst: descriptor,
            value: Expr::runtime(RuntimeCall::ClassByType, vec![class]),
        },
        Stmt::SetField {
            target: None,
            field,
            value: Operand::Local(descriptor),
        },
    ];
    if let Some(publish) = &publish {
        let handle = body.add_local("objCClassHandle", ValueType::Long);
        let publish_ref = MethodRef::new(
            decl_name.clone(),
            publish.name.clone(),
            publish.param_types(),
            ValueType::Long,
        );
        stmts.extend([
            Stmt::Assign {
                dst: handle,
                value: Expr::runtime(RuntimeCall::GetHandle, vec![Operand::Local(descriptor)]),
            },
            Stmt::Assign {
                dst: handle,
                value: Expr::invoke_static(publish_ref, vec![Operand::Local(handle)]),
            },
            Stmt::Eval(Expr::runtime(
                RuntimeCall::AssociateAlias,
                vec![Operand::Local(descriptor), Operand::Local(handle)],
            )),
        ]);
    }
    body.insert_before_return(stmts);
    if let Some(export) = &export {
        debug!(class = %export.class, symbol = %export.symbol, "publishing class descriptor");
    }
    export
}

/// `private static long $publishClass(long)`: copies the descriptor into `symbol`.
fn publish_method(decl: &TypeDecl, symbol: &str) -> MethodDecl {
    let mut b = BodyBuilder::new();
    let ret = b.local("ret", ValueType::Long);
    b.assign(
        ret,
        Expr::runtime(RuntimeCall::PublishDescriptor(symbol.to_owned()), vec![Operand::Param(0)]),
    );
    b.ret(Some(Operand::Local(ret)));
    let mut method = MethodDecl::new(
        PUBLISH_METHOD,
        vec![Param::with_attrs(ValueType::Long, ValueAttrs::pointer())],
        ValueType::Long,
        Modifiers::private_static(),
    )
    .with_annotation(Annotation::PublishDescriptor(symbol.to_owned()))
    .with_body(b.finish());
    method.ret_attrs = ValueAttrs::pointer();
    debug!(owner = %decl.name, %symbol, "synthesized descriptor publication");
    method
}

/// Intern every selector into its `$sel$` field, in sorted order.
pub fn register_selectors<'s>(
    ctx: &TransformContext<'_>,
    decl: &mut TypeDecl,
    selectors: impl IntoIterator<Item = &'s str>,
) {
    let selectors: BTreeSet<&str> = selectors.into_iter().collect();
    if selectors.is_empty() {
        return;
    }
    let owner = decl.name.clone();
    let mut fields = Vec::new();
    let mut stmts = Vec::new();
    let body = decl.static_initializer_body();
    let sel = body.add_local("sel", ctx.selector_type());
    for selector in selectors {
        let name = selector_field_name(selector);
        stmts.push(Stmt::Assign {
            dst: sel,
            value: Expr::runtime(RuntimeCall::RegisterSelector, vec![Operand::str(selector)]),
        });
        stmts.push(Stmt::SetField {
            target: None,
            field: FieldRef {
                owner: owner.clone(),
                name: name.clone(),
                ty: ctx.selector_type(),
                is_static: true,
            },
            value: Operand::Local(sel),
        });
        fields.push(name);
    }
    body.insert_before_return(stmts);
    for name in fields {
        if !decl.has_field(&name) {
            decl.fields.push(constant_field(name, ctx.selector_type()));
        }
    }
}
