//! Unit conversion constants
//!
//! Definition files speak tons, kN, km and km/h. The physics engine works in
//! SI units. Every conversion goes through here.

/// Standard gravity (m/s²)
pub const GRAVITY: f64 = 9.81;

/// Kilograms per metric ton
pub const KG_PER_TON: f64 = 1000.0;

/// Newtons per kilonewton
pub const N_PER_KN: f64 = 1000.0;

/// Metres per kilometre
pub const M_PER_KM: f64 = 1000.0;

/// Kilometres per hour in one metre per second
pub const KMH_PER_MS: f64 = 3.6;

pub fn tons_to_kg(tons: f64) -> f64 {
    tons * KG_PER_TON
}

pub fn kn_to_n(kn: f64) -> f64 {
    kn * N_PER_KN
}

pub fn km_to_m(km: f64) -> f64 {
    km * M_PER_KM
}

pub fn m_to_km(m: f64) -> f64 {
    m / M_PER_KM
}

pub fn kmh_to_ms(kmh: f64) -> f64 {
    kmh / KMH_PER_MS
}

pub fn ms_to_kmh(ms: f64) -> f64 {
    ms * KMH_PER_MS
}
