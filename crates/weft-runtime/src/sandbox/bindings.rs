//! JavaScript bindings for the weft sandbox.
//!
//! This module provides the restricted global surface exposed to component
//! module code running in Boa. The `weft` global carries:
//!
//! - `weft.register(moduleId, init, ...descriptors)` - publish the component
//!   definitions of a module and release callers waiting on it
//! - `weft.ui` - rendering primitives handed to module initializers
//! - `weft.session` - a namespace object shared by all modules of one render
//!   session, optionally pre-seeded from configuration
//!
//! Nothing else from the host environment is reachable: no filesystem,
//! network, process or environment access.
//!
//! # Staging
//!
//! `register` runs on the sandbox thread, inside a script evaluation. It
//! cannot touch the loader's state directly, so it stages each registration
//! in a thread-local; the executing side harvests the staged registrations
//! when the evaluation returns and commits them to the registry.

use boa_engine::{
    js_string,
    native_function::NativeFunction,
    object::{FunctionObjectBuilder, JsObject},
    value::JsValue,
    Context, JsNativeError, Source,
};
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use weft_core::{Result, WeftError};

use crate::sandbox::conversions::{js_value_to_json, json_to_js_value};

/// One `weft.register` call captured during a script evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedRegistration {
    /// Module identifier passed as the first argument.
    pub module_id: String,
    /// Descriptor objects, already converted to JSON.
    pub descriptors: Vec<JsonValue>,
}

thread_local! {
    static STAGED: RefCell<Vec<StagedRegistration>> = const { RefCell::new(Vec::new()) };
}

fn stage_registration(registration: StagedRegistration) {
    STAGED.with(|staged| staged.borrow_mut().push(registration));
}

/// Drains every registration staged on this thread since the last call.
pub(crate) fn take_staged() -> Vec<StagedRegistration> {
    STAGED.with(|staged| staged.borrow_mut().drain(..).collect())
}

/// Rendering primitives installed on `weft.ui`.
///
/// Kept as an evaluated prelude so the primitive surface stays plain
/// JavaScript data; the host only wires it up.
const UI_PRELUDE: &str = r#"
(function () {
    var ui = weft.ui;
    ui.element = function (tag, attrs, children) {
        return { tag: String(tag), attrs: attrs || {}, children: children || [] };
    };
    ui.text = function (value) {
        return { text: String(value) };
    };
})();
"#;

/// Installs the `weft` global into a fresh Boa context.
///
/// `session_data` seeds the `weft.session` namespace before any module code
/// runs.
pub(crate) fn install_weft_bindings(
    ctx: &mut Context,
    session_data: &serde_json::Map<String, JsonValue>,
) -> Result<()> {
    let weft_object = JsObject::with_object_proto(ctx.intrinsics());

    // Session namespace, shared by every module executed in this context.
    let session = JsObject::with_object_proto(ctx.intrinsics());
    for (key, value) in session_data {
        let js_value = json_to_js_value(value.clone(), ctx)?;
        session
            .create_data_property_or_throw(js_string!(key.clone()), js_value, ctx)
            .map_err(|e| {
                WeftError::Execution(format!("failed to seed session key '{}': {}", key, e))
            })?;
    }
    weft_object
        .set(js_string!("session"), session, false, ctx)
        .map_err(|e| WeftError::Execution(e.to_string()))?;

    // Rendering primitives namespace; the prelude below fills it in.
    let ui = JsObject::with_object_proto(ctx.intrinsics());
    weft_object
        .set(js_string!("ui"), ui, false, ctx)
        .map_err(|e| WeftError::Execution(e.to_string()))?;

    let register_fn = FunctionObjectBuilder::new(
        ctx.realm(),
        NativeFunction::from_copy_closure(|_this, args, context| {
            let module_id = args
                .first()
                .and_then(|v| v.as_string())
                .ok_or_else(|| {
                    JsNativeError::typ().with_message("First argument must be a module id string")
                })?
                .to_std_string()
                .map_err(|e| {
                    JsNativeError::typ().with_message(format!("Invalid module id: {:?}", e))
                })?;

            let init = args.get(1).cloned().unwrap_or_default();
            let init_fn = init.as_object().filter(|o| o.is_callable()).cloned();
            if init_fn.is_none() && !init.is_undefined() && !init.is_null() {
                return Err(JsNativeError::typ()
                    .with_message("Second argument must be a function or null")
                    .into());
            }

            // Hand the initializer the primitives and the session namespace,
            // never the full global object.
            if let Some(init_fn) = init_fn {
                let weft = context
                    .global_object()
                    .get(js_string!("weft"), context)?;
                let weft_obj = weft.as_object().ok_or_else(|| {
                    JsNativeError::typ().with_message("weft is not an object")
                })?;
                let ui = weft_obj.get(js_string!("ui"), context)?;
                let session = weft_obj.get(js_string!("session"), context)?;
                init_fn.call(&JsValue::undefined(), &[ui, session], context)?;
            }

            let mut descriptors = Vec::with_capacity(args.len().saturating_sub(2));
            for (i, value) in args.iter().skip(2).enumerate() {
                if !value.is_object() {
                    return Err(JsNativeError::typ()
                        .with_message(format!("Descriptor {} must be an object", i))
                        .into());
                }
                let json = js_value_to_json(value.clone(), context).map_err(|e| {
                    JsNativeError::typ()
                        .with_message(format!("Descriptor {} conversion failed: {}", i, e))
                })?;
                descriptors.push(json);
            }

            stage_registration(StagedRegistration {
                module_id,
                descriptors,
            });
            Ok(JsValue::undefined())
        }),
    )
    .build();

    weft_object
        .set(js_string!("register"), register_fn, false, ctx)
        .map_err(|e| WeftError::Execution(e.to_string()))?;

    ctx.register_global_property(
        js_string!("weft"),
        weft_object,
        boa_engine::property::Attribute::all(),
    )
    .map_err(|e| WeftError::Execution(e.to_string()))?;

    ctx.eval(Source::from_bytes(UI_PRELUDE))
        .map_err(|e| WeftError::Execution(format!("ui prelude evaluation error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_context() -> Context {
        let mut ctx = Context::default();
        install_weft_bindings(&mut ctx, &serde_json::Map::new()).unwrap();
        ctx
    }

    /// Test that the weft global surface is installed
    #[test]
    fn test_install_bindings() {
        let mut ctx = test_context();

        let weft = ctx
            .global_object()
            .get(js_string!("weft"), &mut ctx)
            .unwrap();
        assert!(weft.is_object(), "weft should be an object");

        let weft_obj = weft.as_object().unwrap();
        let register = weft_obj.get(js_string!("register"), &mut ctx).unwrap();
        assert!(
            register.as_function().is_some(),
            "register should be a function"
        );

        let session = weft_obj.get(js_string!("session"), &mut ctx).unwrap();
        assert!(session.is_object(), "session should be an object");

        let ui = weft_obj.get(js_string!("ui"), &mut ctx).unwrap();
        assert!(ui.is_object(), "ui should be an object");
    }

    /// Test that the ui prelude installs the rendering primitives
    #[test]
    fn test_ui_prelude_primitives() {
        let mut ctx = test_context();

        let result = ctx
            .eval(Source::from_bytes(
                "weft.ui.element('div', { id: 'x' }, [weft.ui.text('hi')]).children[0].text",
            ))
            .unwrap();
        assert_eq!(result.as_string().unwrap().to_std_string().unwrap(), "hi");
    }

    /// Test that register stages the module id and its descriptors
    #[test]
    fn test_register_stages_descriptors() {
        let mut ctx = test_context();
        let _ = take_staged();

        ctx.eval(Source::from_bytes(
            r#"
            weft.register('m1', function (ui, session) {
                session.booted = true;
            }, { tag: 'x-a', module: 'm1', styles: { $: 's1' } });
        "#,
        ))
        .expect("script evaluation should succeed");

        let staged = take_staged();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].module_id, "m1");
        assert_eq!(
            staged[0].descriptors,
            vec![json!({ "tag": "x-a", "module": "m1", "styles": { "$": "s1" } })]
        );
    }

    /// Test that a null initializer is accepted
    #[test]
    fn test_register_accepts_null_initializer() {
        let mut ctx = test_context();
        let _ = take_staged();

        ctx.eval(Source::from_bytes(
            "weft.register('m2', null, { tag: 'x-b', module: 'm2' });",
        ))
        .expect("script evaluation should succeed");

        let staged = take_staged();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].module_id, "m2");
    }

    /// Test that register validates its arguments
    #[test]
    fn test_register_validates_arguments() {
        let mut ctx = test_context();
        let _ = take_staged();

        assert!(ctx.eval(Source::from_bytes("weft.register()")).is_err());
        assert!(ctx
            .eval(Source::from_bytes("weft.register(7, function () {})"))
            .is_err());
        assert!(ctx
            .eval(Source::from_bytes("weft.register('m1', 'not a function')"))
            .is_err());
        assert!(ctx
            .eval(Source::from_bytes("weft.register('m1', null, 'not an object')"))
            .is_err());

        assert!(take_staged().is_empty());
    }

    /// Test that a throwing initializer fails the whole registration
    #[test]
    fn test_throwing_initializer_propagates() {
        let mut ctx = test_context();
        let _ = take_staged();

        let result = ctx.eval(Source::from_bytes(
            r#"
            weft.register('m1', function () {
                throw new Error('boot failure');
            }, { tag: 'x-a', module: 'm1' });
        "#,
        ));
        assert!(result.is_err());
    }

    /// Test that the initializer receives the ui primitives and the shared
    /// session namespace
    #[test]
    fn test_initializer_receives_ui_and_session() {
        let mut ctx = test_context();
        let _ = take_staged();

        ctx.eval(Source::from_bytes(
            r#"
            weft.register('m1', function (ui, session) {
                session.header = ui.element('header', {}, []);
            }, { tag: 'x-a', module: 'm1' });
        "#,
        ))
        .expect("script evaluation should succeed");

        let tag = ctx
            .eval(Source::from_bytes("weft.session.header.tag"))
            .unwrap();
        assert_eq!(tag.as_string().unwrap().to_std_string().unwrap(), "header");
        let _ = take_staged();
    }

    /// Test that configured session data is visible to module code
    #[test]
    fn test_session_data_is_seeded() {
        let mut ctx = Context::default();
        let mut session_data = serde_json::Map::new();
        session_data.insert("locale".to_string(), json!("en"));
        session_data.insert("build".to_string(), json!(42));
        install_weft_bindings(&mut ctx, &session_data).unwrap();

        let locale = ctx.eval(Source::from_bytes("weft.session.locale")).unwrap();
        assert_eq!(locale.as_string().unwrap().to_std_string().unwrap(), "en");

        let build = ctx.eval(Source::from_bytes("weft.session.build")).unwrap();
        assert_eq!(build.as_number(), Some(42.0));
    }
}
