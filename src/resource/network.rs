//! Network descriptors

/// Network driver types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NetworkDriver {
    /// Bridge network (default)
    #[default]
    Bridge,
    /// Host network
    Host,
    /// No networking
    None,
}

impl std::fmt::Display for NetworkDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkDriver::Bridge => write!(f, "bridge"),
            NetworkDriver::Host => write!(f, "host"),
            NetworkDriver::None => write!(f, "none"),
        }
    }
}

/// The virtual network the stack's containers attach to
#[derive(Debug, Clone)]
pub struct NetworkSpec {
    /// Network name
    pub name: String,
    /// Network driver
    pub driver: NetworkDriver,
}

impl NetworkSpec {
    /// Create a new network descriptor
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            driver: NetworkDriver::default(),
        }
    }

    /// Set the network driver
    pub fn driver(mut self, driver: NetworkDriver) -> Self {
        self.driver = driver;
        self
    }
}
