//! Integration tests for template resolution and update maps.

use kdict::core::SpectralIndex;
use kdict::prelude::*;

/// Participating medium with a CKD-dependent extinction and a shared phase.
fn atmosphere_template() -> KernelDictTemplate {
    let mut phase = KernelDictTemplate::builder();
    phase.insert_value("type", "hg").unwrap();
    phase
        .insert(
            "g",
            UpdateParameter::new(
                |ctx| match ctx.spectral_index()? {
                    SpectralIndex::Ckd { g, .. } => Ok(*g * 0.5),
                    SpectralIndex::Mono { wavelength } => Ok(wavelength / 2000.0),
                },
                ParamFlags::SPECTRAL,
            ),
        )
        .unwrap();
    let phase = phase.build();

    let mut b = KernelDictTemplate::builder();
    b.insert_value("type", "scene").unwrap();
    b.insert_template("phase_atmosphere", &phase).unwrap();
    b.insert_value("atmosphere.type", "homogeneous").unwrap();
    b.insert(
        "atmosphere.sigma_t.value",
        UpdateParameter::new(
            |ctx| {
                let scale = ctx.kwarg("scale")?.as_f64().unwrap_or(1.0);
                Ok(scale * if ctx.si().and_then(SpectralIndex::bin).is_some() { 2.0 } else { 1.0 })
            },
            ParamFlags::SPECTRAL,
        ),
    )
    .unwrap();
    b.insert_value("atmosphere.sigma_t.type", "uniform").unwrap();
    b.insert_value("atmosphere.phase.type", "ref").unwrap();
    b.insert_value("atmosphere.phase.id", "phase_atmosphere").unwrap();
    b.insert(
        "atmosphere.albedo",
        UpdateParameter::from_evaluator(Evaluator::Reference("phase_atmosphere.g".into()), ParamFlags::SPECTRAL),
    )
    .unwrap();
    b.insert_value("sensor.type", "hdistant").unwrap();
    b.insert("sensor.to_world", UpdateParameter::constant(1.0, ParamFlags::GEOMETRIC))
        .unwrap();
    b.build()
}

fn ctx() -> KernelContext {
    KernelContext::ckd("550", 0.4).with_kwarg("scale", 3.0)
}

#[test]
fn test_resolve_deterministic() {
    let template = atmosphere_template();
    let a = template.resolve(&ctx()).unwrap();
    let b = template.resolve(&ctx()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_json_pretty().unwrap(), b.to_json_pretty().unwrap());
}

#[test]
fn test_update_map_is_projection() {
    let template = atmosphere_template();
    let dict = template.resolve(&ctx()).unwrap();
    let patch = template.extract_update_map().resolve(&ctx()).unwrap();

    let updatable: Vec<&str> = template
        .iter()
        .filter(|(_, p)| p.is_updatable())
        .map(|(k, _)| k)
        .collect();
    assert_eq!(patch.len(), updatable.len());
    for path in updatable {
        assert_eq!(patch.get(path), dict.get_path(path), "path {path}");
    }
}

#[test]
fn test_nested_template_and_reference() {
    let dict = atmosphere_template().resolve(&ctx()).unwrap();
    assert_eq!(dict.get_path("phase_atmosphere.g"), Some(&Value::Float(0.2)));
    assert_eq!(dict.get_path("atmosphere.albedo"), Some(&Value::Float(0.2)));
    assert_eq!(dict.get_path("atmosphere.sigma_t.value"), Some(&Value::Float(6.0)));
    assert!(dict.get_path("atmosphere.phase").and_then(Value::as_dict).unwrap().is_reference());
}

#[test]
fn test_missing_kwarg() {
    let err = atmosphere_template()
        .resolve(&KernelContext::ckd("550", 0.4))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ContextMismatch { ref path, ref axis } if path == "atmosphere.sigma_t.value" && axis == "scale"
    ));
}

#[test]
fn test_resolve_flags_subset() {
    let umap = atmosphere_template().extract_update_map();
    let spectral = umap.resolve_flags(&ctx(), ParamFlags::SPECTRAL).unwrap();
    let geometric = umap.resolve_flags(&ctx(), ParamFlags::GEOMETRIC).unwrap();

    assert_eq!(spectral.len(), 3);
    assert_eq!(geometric.len(), 1);
    assert_eq!(geometric.get("sensor.to_world"), Some(&Value::Float(1.0)));
}

#[test]
fn test_shared_object_render() {
    let template = atmosphere_template();
    let kernel = MemoryKernel::new();
    let mut wrapper = MitsubaObjectWrapper::new();

    let ctxs = [ctx(), KernelContext::ckd("560", 0.8).with_kwarg("scale", 1.0)];
    let results = mi_render(&kernel, &template, &ctxs, &mut wrapper, &RenderOptions::default()).unwrap();

    let keys: Vec<&str> = results.keys().map(String::as_str).collect();
    assert_eq!(keys, ["550:0.4", "560:0.8"]);
    assert_eq!(wrapper.build_count(), 1);

    // The phase function is referenced twice but indexed once
    let g_params: Vec<&str> = wrapper
        .parameters()
        .keys()
        .filter(|k| k.ends_with(".g"))
        .collect();
    assert_eq!(g_params, ["phase_atmosphere.g"]);
}

#[test]
fn test_unknown_parameter_is_atomic() {
    let template = atmosphere_template();
    let kernel = MemoryKernel::new();
    let mut wrapper = MitsubaObjectWrapper::new();
    wrapper.build(&kernel, &template, &ctx()).unwrap();
    let before = wrapper.object().unwrap().checksum();

    let next = KernelContext::ckd("560", 0.8).with_kwarg("scale", 5.0);
    let mut patch = template.extract_update_map().resolve(&next).unwrap();
    patch.insert("atmosphere.sigma_s.value", 1.0);

    let err = UpdateMapTemplate::apply(&mut wrapper, &patch).unwrap_err();
    assert!(matches!(err, Error::UnknownParameter { ref path } if path == "atmosphere.sigma_s.value"));
    assert_eq!(wrapper.object().unwrap().checksum(), before);
    assert_eq!(wrapper.object().unwrap().commit_count(), 0);
}
