//! Hands out owned port handles by their one-based number.

/// Owns `N` port handles and gives each out at most once.
#[derive(Debug)]
pub struct PortTable<T, const N: usize> {
    slots: [Option<T>; N],
}

impl<T, const N: usize> PortTable<T, N> {
    /// `ports[0]` is port 1.
    pub fn new(ports: [T; N]) -> Self {
        Self {
            slots: ports.map(Some),
        }
    }

    /// Takes port `number`, or `None` if it is out of range or already taken.
    pub fn take(&mut self, number: u8) -> Option<T> {
        let index = usize::from(number).checked_sub(1)?;
        self.slots.get_mut(index)?.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_port_is_taken_once() {
        let mut ports = PortTable::new(["one", "two", "three"]);
        assert_eq!(ports.take(3), Some("three"));
        assert_eq!(ports.take(1), Some("one"));
        assert_eq!(ports.take(3), None);
    }

    #[test]
    fn out_of_range_numbers_are_refused() {
        let mut ports = PortTable::new([(); 21]);
        assert_eq!(ports.take(0), None);
        assert_eq!(ports.take(22), None);
        assert_eq!(ports.take(21), Some(()));
    }
}
