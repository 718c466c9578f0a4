//! Process-wide debug toggles, collected once at startup and threaded
//! explicitly into the components that need them (per §9: "Global state.
//! The debug flag bundle is process-wide; pass it explicitly as a struct").

#[derive(Debug, Clone, Copy, Default)]
pub struct DebugFlags {
    pub all: bool,
    pub year: bool,
    pub api: bool,
    pub cache: bool,
    pub library: bool,
    pub pipeline: bool,
}

fn flag_enabled(var: &str) -> bool {
    match std::env::var(var) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => false,
    }
}

impl DebugFlags {
    pub fn from_env() -> Self {
        Self {
            all: flag_enabled("DEBUG_ALL"),
            year: flag_enabled("DEBUG_YEAR"),
            api: flag_enabled("DEBUG_API"),
            cache: flag_enabled("DEBUG_CACHE"),
            library: flag_enabled("DEBUG_LIBRARY"),
            pipeline: flag_enabled("DEBUG_PIPELINE"),
        }
    }

    pub fn year_enabled(&self) -> bool {
        self.all || self.year
    }

    pub fn api_enabled(&self) -> bool {
        self.all || self.api
    }

    pub fn cache_enabled(&self) -> bool {
        self.all || self.cache
    }

    pub fn library_enabled(&self) -> bool {
        self.all || self.library
    }

    pub fn pipeline_enabled(&self) -> bool {
        self.all || self.pipeline
    }
}
