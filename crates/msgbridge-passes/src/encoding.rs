//! Foreign-runtime type encodings of callback signatures.

use std::collections::HashSet;

use msgbridge_core::PointerWidth;
use msgbridge_model::{ClassPath, MachineSized, MethodDecl, TypeKind, ValueAttrs, ValueType};

/// Encode `callback` as return type followed by every parameter, receiver and selector included.
pub fn encode_method(
    class_path: &ClassPath,
    pointer_width: PointerWidth,
    callback: &MethodDecl,
) -> Result<String, String> {
    let encoder = TypeEncoder {
        class_path,
        is_64: pointer_width.is_64(),
    };
    let mut out = encoder.encode(&callback.ret, &callback.ret_attrs)?;
    for param in &callback.params {
        out.push_str(&encoder.encode(&param.ty, &param.attrs)?);
    }
    Ok(out)
}

struct TypeEncoder<'a> {
    class_path: &'a ClassPath,
    is_64: bool,
}

impl TypeEncoder<'_> {
    fn encode(&self, ty: &ValueType, attrs: &ValueAttrs) -> Result<String, String> {
        let names = self.class_path.runtime();
        let (int, uint, float) = if self.is_64 { ("q", "Q", "d") } else { ("i", "I", "f") };
        Ok(match ty {
            ValueType::Void => "v".into(),
            ValueType::Boolean | ValueType::Byte => "c".into(),
            ValueType::Short => "s".into(),
            ValueType::Char => "S".into(),
            ValueType::Int => "i".into(),
            ValueType::Long if attrs.pointer => "^v".into(),
            ValueType::Long => match attrs.machine_sized {
                Some(MachineSized::SInt) => int.into(),
                Some(MachineSized::UInt) => uint.into(),
                _ => "q".into(),
            },
            ValueType::Float | ValueType::Double if attrs.machine_sized == Some(MachineSized::Float) => {
                float.into()
            }
            ValueType::Float => "f".into(),
            ValueType::Double => "d".into(),
            ValueType::Object(name) if *name == names.selector => ":".into(),
            ValueType::Object(name) if *name == names.class => "#".into(),
            ValueType::Object(_) => "@".into(),
            ValueType::Struct(name) => {
                let body = self.encode_struct(name, &mut HashSet::new())?;
                if attrs.by_val { body } else { format!("^{body}") }
            }
            ValueType::Array(_) => return Err(format!("arrays have no native encoding: {ty}")),
        })
    }

    fn encode_struct(
        &self,
        name: &msgbridge_model::TypeName,
        visiting: &mut HashSet<msgbridge_model::TypeName>,
    ) -> Result<String, String> {
        let decl = self
            .class_path
            .get(name)
            .filter(|d| d.kind == TypeKind::Struct)
            .ok_or_else(|| format!("unknown struct type {name}"))?;
        if !visiting.insert(name.clone()) {
            return Err(format!("struct {name} contains itself by value"));
        }
        let mut out = format!("{{{}=", name.simple_name());
        for member in &decl.struct_members {
            match member {
                ValueType::Struct(inner) => out.push_str(&self.encode_struct(inner, visiting)?),
                other => out.push_str(&self.encode(other, &ValueAttrs::default())?),
            }
        }
        out.push('}');
        visiting.remove(name);
        Ok(out)
    }
}
