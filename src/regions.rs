//! Built-in regional target lists.

use crate::models::Target;

/// A named, ordered list of zip codes.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    pub label: &'static str,
    pub description: &'static str,
    pub zipcodes: &'static [&'static str],
}

impl Region {
    pub fn targets(&self) -> Vec<Target> {
        self.zipcodes.iter().map(|z| Target::from(*z)).collect()
    }
}

/// Dallas-Fort Worth north suburbs.
pub const DFW: Region = Region {
    label: "dfw",
    description: "Dallas-Fort Worth north suburbs",
    zipcodes: &[
        // McKinney
        "75069", "75070", "75071",
        // Frisco
        "75033", "75034", "75035",
        // Prosper, Celina
        "75078", "75009",
        // Allen
        "75002", "75013",
        // Plano
        "75023", "75024", "75025", "75074", "75075", "75093",
        // Richardson
        "75080", "75081", "75082",
        // The Colony, Little Elm
        "75056", "75068",
        // Denton
        "76201", "76205", "76210",
    ],
};

pub const ALL: &[Region] = &[DFW];

/// Look up a region by label (case-insensitive).
pub fn find(label: &str) -> Option<&'static Region> {
    ALL.iter().find(|r| r.label.eq_ignore_ascii_case(label))
}
