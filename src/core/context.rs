//! Per-render evaluation context.
//!
//! A [`KernelContext`] bundles the axes a template is resolved against:
//! the spectral point being rendered, free-form keyword axes supplied by the
//! experiment layer, and the unit conversion state. Contexts are immutable
//! and cheap to clone.

use std::fmt;

use indexmap::IndexMap;

use crate::util::{Error, Result, Value};

/// Spectral point being rendered.
#[derive(Clone, Debug, PartialEq)]
pub enum SpectralIndex {
    /// Monochromatic mode: a single wavelength in nm.
    Mono { wavelength: f64 },
    /// Correlated-k distribution mode: a spectral bin and a quadrature point.
    Ckd { bin: String, g: f64 },
}

impl SpectralIndex {
    /// Monochromatic index.
    pub fn mono(wavelength: f64) -> Self {
        Self::Mono { wavelength }
    }

    /// CKD index.
    pub fn ckd(bin: impl Into<String>, g: f64) -> Self {
        Self::Ckd { bin: bin.into(), g }
    }

    /// Wavelength in nm (monochromatic mode only).
    pub fn wavelength(&self) -> Option<f64> {
        match self {
            Self::Mono { wavelength } => Some(*wavelength),
            Self::Ckd { .. } => None,
        }
    }

    /// Bin id and quadrature point (CKD mode only).
    pub fn bin(&self) -> Option<(&str, f64)> {
        match self {
            Self::Ckd { bin, g } => Some((bin, *g)),
            Self::Mono { .. } => None,
        }
    }

    /// String identifier used to key render results.
    pub fn index_id(&self) -> String {
        match self {
            Self::Mono { wavelength } => format!("{wavelength}"),
            Self::Ckd { bin, g } => format!("{bin}:{g}"),
        }
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mono { wavelength } => write!(f, "{wavelength} nm"),
            Self::Ckd { bin, g } => write!(f, "bin {bin} (g={g})"),
        }
    }
}

/// Unit conversion state: scale factors from configuration units to kernel
/// units, per physical quantity.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitContext {
    length: String,
    scales: IndexMap<String, f64>,
}

impl Default for UnitContext {
    fn default() -> Self {
        Self { length: "m".to_string(), scales: IndexMap::new() }
    }
}

impl UnitContext {
    /// Unit context with the given kernel length unit.
    pub fn new(length: impl Into<String>) -> Self {
        Self { length: length.into(), scales: IndexMap::new() }
    }

    /// Builder-style scale factor registration.
    pub fn with_scale(mut self, quantity: impl Into<String>, factor: f64) -> Self {
        self.scales.insert(quantity.into(), factor);
        self
    }

    /// Kernel length unit symbol.
    pub fn length(&self) -> &str {
        &self.length
    }

    /// Scale factor for a quantity (1 when unregistered).
    pub fn scale(&self, quantity: &str) -> f64 {
        self.scales.get(quantity).copied().unwrap_or(1.0)
    }

    /// Convert a magnitude expressed in configuration units to kernel units.
    pub fn to_kernel(&self, quantity: &str, magnitude: f64) -> f64 {
        magnitude * self.scale(quantity)
    }
}

/// Immutable bundle of per-render axes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KernelContext {
    si: Option<SpectralIndex>,
    kwargs: IndexMap<String, Value>,
    units: UnitContext,
}

impl KernelContext {
    /// Empty context (no spectral axis).
    pub fn new() -> Self {
        Self::default()
    }

    /// Context at a monochromatic wavelength (nm).
    pub fn mono(wavelength: f64) -> Self {
        Self::new().with_spectral_index(SpectralIndex::mono(wavelength))
    }

    /// Context at a CKD bin and quadrature point.
    pub fn ckd(bin: impl Into<String>, g: f64) -> Self {
        Self::new().with_spectral_index(SpectralIndex::ckd(bin, g))
    }

    /// Builder-style spectral index.
    pub fn with_spectral_index(mut self, si: SpectralIndex) -> Self {
        self.si = Some(si);
        self
    }

    /// Builder-style keyword axis.
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Builder-style unit context.
    pub fn with_units(mut self, units: UnitContext) -> Self {
        self.units = units;
        self
    }

    /// Spectral index, if any.
    pub fn si(&self) -> Option<&SpectralIndex> {
        self.si.as_ref()
    }

    /// Spectral index, failing if the context has none.
    pub fn spectral_index(&self) -> Result<&SpectralIndex> {
        self.si.as_ref().ok_or_else(|| Error::missing_axis("spectral index"))
    }

    /// Wavelength in nm, failing if the context is not monochromatic.
    pub fn wavelength(&self) -> Result<f64> {
        self.spectral_index()?
            .wavelength()
            .ok_or_else(|| Error::missing_axis("wavelength"))
    }

    /// Keyword axis, failing if absent.
    pub fn kwarg(&self, key: &str) -> Result<&Value> {
        self.kwargs.get(key).ok_or_else(|| Error::missing_axis(key))
    }

    /// Keyword axes in insertion order.
    pub fn kwargs(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.kwargs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Unit conversion state.
    pub fn units(&self) -> &UnitContext {
        &self.units
    }

    /// Identifier of the spectral point, used to key render results.
    pub fn index_id(&self) -> String {
        self.si
            .as_ref()
            .map(SpectralIndex::index_id)
            .unwrap_or_else(|| "default".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_context() {
        let ctx = KernelContext::mono(550.0);
        assert_eq!(ctx.wavelength().unwrap(), 550.0);
        assert_eq!(ctx.index_id(), "550");
    }

    #[test]
    fn test_missing_axes() {
        let ctx = KernelContext::new();
        assert!(matches!(
            ctx.wavelength(),
            Err(Error::ContextMismatch { ref axis, .. }) if axis == "spectral index"
        ));

        let ctx = KernelContext::ckd("510", 0.5);
        assert!(matches!(
            ctx.wavelength(),
            Err(Error::ContextMismatch { ref axis, .. }) if axis == "wavelength"
        ));
        assert_eq!(ctx.index_id(), "510:0.5");
        assert!(ctx.kwarg("sza").is_err());
    }

    #[test]
    fn test_units() {
        let units = UnitContext::new("km").with_scale("length", 1e-3);
        let ctx = KernelContext::new().with_units(units);
        assert_eq!(ctx.units().length(), "km");
        assert_eq!(ctx.units().to_kernel("length", 100.0), 0.1);
        assert_eq!(ctx.units().scale("radiance"), 1.0);
    }
}
