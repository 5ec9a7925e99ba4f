/// Public address validation
///
/// The server never interprets miner addresses itself; it only asks an
/// `AddressValidator` whether the claimed string is acceptable.

/// Length in bytes of a public address
pub const PUBLIC_ADDRESS_LENGTH: usize = 32;

pub trait AddressValidator: Send + Sync {
    fn is_valid(&self, address: &str) -> bool;
}

/// Accepts hex-encoded 32-byte public addresses.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublicAddressValidator;

impl AddressValidator for PublicAddressValidator {
    fn is_valid(&self, address: &str) -> bool {
        address.len() == PUBLIC_ADDRESS_LENGTH * 2
            && address.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl<F> AddressValidator for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_valid(&self, address: &str) -> bool {
        self(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_address_validation() {
        let v = PublicAddressValidator;
        assert!(v.is_valid(&"ab".repeat(32)));
        assert!(v.is_valid(&"AB".repeat(32)));
        assert!(!v.is_valid(&"ab".repeat(31)));
        assert!(!v.is_valid(&"zz".repeat(32)));
        assert!(!v.is_valid(""));
    }

    #[test]
    fn test_closure_validator() {
        let v = |addr: &str| addr.starts_with("iron");
        assert!(v.is_valid("iron1"));
        assert!(!AddressValidator::is_valid(&v, "coal1"));
    }
}
