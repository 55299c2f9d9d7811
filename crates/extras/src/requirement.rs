use std::fmt;
use std::str::FromStr;

/// Release version with up to three numeric components; missing ones are 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn next_major(&self) -> Self {
        Self::new(self.major.saturating_add(1), 0, 0)
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() > 3 {
            return Err(format!("version {s:?} has more than three components"));
        }
        let mut nums = [0u32; 3];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(format!("version {s:?} is not numeric"));
            }
            *slot = part
                .parse()
                .map_err(|_| format!("version component {part:?} is out of range"))?;
        }
        Ok(Self::new(nums[0], nums[1], nums[2]))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// `package>=minimum,<below` where `below` is the next major after `minimum`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub package: String,
    pub minimum: Version,
    pub below: Version,
}

impl Requirement {
    pub fn allows(&self, version: &Version) -> bool {
        *version >= self.minimum && *version < self.below
    }

    /// Returns a human readable reason on failure.
    pub fn parse(specifier: &str) -> Result<Self, String> {
        let (package, constraints) = specifier
            .split_once(">=")
            .ok_or_else(|| "missing '>=' lower bound".to_string())?;
        let package = package.trim();
        if !is_valid_package(package) {
            return Err(format!("invalid package name {package:?}"));
        }

        let (lower, upper) = constraints
            .split_once(',')
            .ok_or_else(|| "missing ',<' upper bound".to_string())?;
        let minimum: Version = lower.parse()?;

        let upper = upper.trim();
        let bound = upper
            .strip_prefix('<')
            .filter(|rest| !rest.starts_with('='))
            .ok_or_else(|| format!("upper bound {upper:?} must be exclusive '<'"))?;
        let below: Version = bound.parse()?;

        if below != minimum.next_major() {
            return Err(format!(
                "upper bound {below} must be the next major version after {minimum}"
            ));
        }

        Ok(Self {
            package: package.to_string(),
            minimum,
            below,
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>={},<{}", self.package, self.minimum, self.below.major)
    }
}

fn is_valid_package(name: &str) -> bool {
    let bytes = name.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) if first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric() => {
            bytes
                .iter()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_components() {
        assert_eq!("1".parse::<Version>().unwrap(), Version::new(1, 0, 0));
        assert_eq!("1.2".parse::<Version>().unwrap(), Version::new(1, 2, 0));
        assert_eq!("1.2.9".parse::<Version>().unwrap(), Version::new(1, 2, 9));
        assert!("1.2.3.4".parse::<Version>().is_err());
        assert!("1.x".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
        assert!("1..2".parse::<Version>().is_err());
    }

    #[test]
    fn test_parse_specifier() {
        let r = Requirement::parse("livekit-plugins-silero>=1.2.9,<2").unwrap();
        assert_eq!(r.package, "livekit-plugins-silero");
        assert_eq!(r.minimum, Version::new(1, 2, 9));
        assert_eq!(r.below, Version::new(2, 0, 0));
        assert_eq!(r.to_string(), "livekit-plugins-silero>=1.2.9,<2");
    }

    #[test]
    fn test_whitespace_is_tolerated() {
        let r = Requirement::parse("pkg >= 0.1 , < 1").unwrap();
        assert_eq!(r.package, "pkg");
        assert_eq!(r.below, Version::new(1, 0, 0));
    }

    #[test]
    fn test_upper_bound_must_be_next_major() {
        assert!(Requirement::parse("pkg>=1.2,<3").is_err());
        assert!(Requirement::parse("pkg>=1.2,<1.9").is_err());
        assert!(Requirement::parse("pkg>=1.2,<2.1").is_err());
        assert!(Requirement::parse("pkg>=1.2,<=2").is_err());
    }

    #[test]
    fn test_malformed_specifiers() {
        assert!(Requirement::parse("pkg").is_err());
        assert!(Requirement::parse("pkg>=1.2").is_err());
        assert!(Requirement::parse(">=1.2,<2").is_err());
        assert!(Requirement::parse("-pkg>=1.2,<2").is_err());
        assert!(Requirement::parse("pkg==1.2").is_err());
    }

    #[test]
    fn test_allows() {
        let r = Requirement::parse("pkg>=1.2.9,<2").unwrap();
        assert!(r.allows(&Version::new(1, 2, 9)));
        assert!(r.allows(&Version::new(1, 99, 0)));
        assert!(!r.allows(&Version::new(1, 2, 8)));
        assert!(!r.allows(&Version::new(2, 0, 0)));
    }
}
