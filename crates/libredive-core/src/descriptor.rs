//! Supported-device registry
//!
//! A static table of every device the library can talk to, so front-ends
//! can present the supported-model list (and the transports each model
//! needs) without touching hardware.

use serde::{Deserialize, Serialize};

/// Driver family implementing a device's protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Family {
    CressiLeonardo,
    UwatecSmart,
}

/// Transport a device family is reachable over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    Serial,
    Irda,
}

/// One supported device model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    pub vendor: &'static str,
    pub product: &'static str,
    pub family: Family,
    /// Model number as reported by the device itself.
    pub model: u32,
    pub transport: TransportKind,
}

static DESCRIPTORS: &[Descriptor] = &[
    // Cressi Leonardo
    Descriptor {
        vendor: "Cressi",
        product: "Leonardo",
        family: Family::CressiLeonardo,
        model: 1,
        transport: TransportKind::Serial,
    },
    Descriptor {
        vendor: "Cressi",
        product: "Giotto",
        family: Family::CressiLeonardo,
        model: 4,
        transport: TransportKind::Serial,
    },
    Descriptor {
        vendor: "Cressi",
        product: "Newton",
        family: Family::CressiLeonardo,
        model: 5,
        transport: TransportKind::Serial,
    },
    Descriptor {
        vendor: "Cressi",
        product: "Drake",
        family: Family::CressiLeonardo,
        model: 6,
        transport: TransportKind::Serial,
    },
    // Uwatec Smart
    Descriptor {
        vendor: "Uwatec",
        product: "Smart Pro",
        family: Family::UwatecSmart,
        model: 0x10,
        transport: TransportKind::Irda,
    },
    Descriptor {
        vendor: "Uwatec",
        product: "Smart Com",
        family: Family::UwatecSmart,
        model: 0x14,
        transport: TransportKind::Irda,
    },
    Descriptor {
        vendor: "Uwatec",
        product: "Smart Tec",
        family: Family::UwatecSmart,
        model: 0x18,
        transport: TransportKind::Irda,
    },
    Descriptor {
        vendor: "Uwatec",
        product: "Smart Z",
        family: Family::UwatecSmart,
        model: 0x1C,
        transport: TransportKind::Irda,
    },
    Descriptor {
        vendor: "Uwatec",
        product: "Galileo Sol",
        family: Family::UwatecSmart,
        model: 0x11,
        transport: TransportKind::Irda,
    },
];

/// Iterate over every supported device.
pub fn descriptors() -> impl Iterator<Item = &'static Descriptor> {
    DESCRIPTORS.iter()
}

/// Iterate over the supported devices of one family.
pub fn descriptors_for(family: Family) -> impl Iterator<Item = &'static Descriptor> {
    DESCRIPTORS.iter().filter(move |d| d.family == family)
}
