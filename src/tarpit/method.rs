use hyper::Method;
use std::fmt;
use std::str::FromStr;

/// What the engine does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    /// Held open and fed filler forever.
    Trap,
    /// Held open without a body.
    Probe,
    /// Dropped straight away.
    Reject,
}

/// Every method the tarpit knows how to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapMethod {
    Get,
    Post,
    Put,
    Patch,
    Connect,
    Trace,
    Report,
    Propfind,
    Proppatch,
    Copy,
    Move,
    Acl,
    Mkcol,
    VersionControl,
    Unlock,
    Merge,
    Link,
    Unlink,
    Head,
    Options,
}

impl TrapMethod {
    pub const ALL: [TrapMethod; 20] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Connect,
        Self::Trace,
        Self::Report,
        Self::Propfind,
        Self::Proppatch,
        Self::Copy,
        Self::Move,
        Self::Acl,
        Self::Mkcol,
        Self::VersionControl,
        Self::Unlock,
        Self::Merge,
        Self::Link,
        Self::Unlink,
        Self::Head,
        Self::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
            Self::Report => "REPORT",
            Self::Propfind => "PROPFIND",
            Self::Proppatch => "PROPPATCH",
            Self::Copy => "COPY",
            Self::Move => "MOVE",
            Self::Acl => "ACL",
            Self::Mkcol => "MKCOL",
            Self::VersionControl => "VERSION-CONTROL",
            Self::Unlock => "UNLOCK",
            Self::Merge => "MERGE",
            Self::Link => "LINK",
            Self::Unlink => "UNLINK",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    pub fn class(&self) -> MethodClass {
        match self {
            Self::Head | Self::Options => MethodClass::Probe,
            _ => MethodClass::Trap,
        }
    }

    pub fn from_method(method: &Method) -> Option<Self> {
        method.as_str().parse().ok()
    }

    /// Methods the tarpit doesn't know are rejected.
    pub fn classify(method: &Method) -> MethodClass {
        Self::from_method(method).map_or(MethodClass::Reject, |method| method.class())
    }
}

impl FromStr for TrapMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for TrapMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn method(name: &str) -> Method {
        Method::from_bytes(name.as_bytes()).unwrap()
    }

    #[test]
    fn test_trapped_methods() {
        for name in [
            "GET", "POST", "PUT", "PATCH", "CONNECT", "TRACE", "REPORT", "PROPFIND", "PROPPATCH",
            "COPY", "MOVE", "ACL", "MKCOL", "VERSION-CONTROL", "UNLOCK", "MERGE", "LINK",
            "UNLINK",
        ] {
            assert_eq!(TrapMethod::classify(&method(name)), MethodClass::Trap, "{}", name);
        }
    }

    #[test]
    fn test_probe_methods() {
        assert_eq!(TrapMethod::classify(&Method::HEAD), MethodClass::Probe);
        assert_eq!(TrapMethod::classify(&Method::OPTIONS), MethodClass::Probe);
    }

    #[test]
    fn test_rejected_methods() {
        for name in ["DELETE", "LOCK", "SEARCH", "M-SEARCH", "PRI", "SUBSCRIBE", "get"] {
            assert_eq!(TrapMethod::classify(&method(name)), MethodClass::Reject, "{}", name);
        }
    }

    #[test]
    fn test_names_round_trip() {
        for trap_method in TrapMethod::ALL {
            assert_eq!(trap_method.to_string().parse(), Ok(trap_method));
        }
    }
}
