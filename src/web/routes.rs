use std::fmt;

/// Logical pages of the application
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutePath {
    Login,
    Bills,
    NewBill,
}

impl RoutePath {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutePath::Login => "/",
            RoutePath::Bills => "/employee/bills",
            RoutePath::NewBill => "/employee/bill/new",
        }
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
