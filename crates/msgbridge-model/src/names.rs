//! Names of the foreign-runtime support types the transform refers to.

use serde::{Deserialize, Serialize};

use crate::types::TypeName;

/// Support-library type names. Every field can be overridden from the class-path file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeNames {
    /// Universal root of all peer types. Constructor inheritance stops here.
    pub object: TypeName,
    /// Root of extension (category) types.
    pub extensions: TypeName,
    /// Base of native objects allocated by the runtime.
    pub native_object: TypeName,
    pub selector: TypeName,
    pub class: TypeName,
    pub super_ref: TypeName,
    pub string: TypeName,
    pub event: TypeName,
    pub app_delegate: TypeName,
    pub ordered_collection: TypeName,
    /// Holder of the shared generic trampolines.
    pub trampolines: TypeName,
    pub linkage_error: TypeName,
}

impl Default for RuntimeNames {
    fn default() -> Self {
        RuntimeNames {
            object: "objc.ObjCObject".into(),
            extensions: "objc.ObjCExtensions".into(),
            native_object: "foundation.NSObject".into(),
            selector: "objc.Selector".into(),
            class: "objc.ObjCClass".into(),
            super_ref: "objc.ObjCSuper".into(),
            string: "java.lang.String".into(),
            event: "uikit.UIEvent".into(),
            app_delegate: "uikit.UIApplicationDelegate".into(),
            ordered_collection: "foundation.NSArray".into(),
            trampolines: "objc.$M".into(),
            linkage_error: "java.lang.NoSuchMethodError".into(),
        }
    }
}

impl RuntimeNames {
    /// Every name with the shape it is bootstrapped as: `true` for interfaces.
    pub fn bootstrap_types(&self) -> Vec<(&TypeName, bool)> {
        vec![
            (&self.object, false),
            (&self.extensions, false),
            (&self.native_object, false),
            (&self.selector, false),
            (&self.class, false),
            (&self.super_ref, false),
            (&self.string, false),
            (&self.event, false),
            (&self.app_delegate, true),
            (&self.ordered_collection, false),
            (&self.trampolines, false),
            (&self.linkage_error, false),
        ]
    }
}
