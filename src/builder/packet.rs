use crate::models::L3;

/// Size of the ICMP and ICMPv6 echo header.
pub const ICMP_HEADER_SIZE: usize = 8;

/// A Packet holds pointers to the ICMP header and payload over a buffer.
///
/// ```
/// use libprobe::builder::Packet;
/// use libprobe::models::L3;
///
/// let mut buffer = [0u8; 1500];
/// let mut packet = Packet::new(&mut buffer, L3::IPv4, 5);
///
/// // Write some data in the payload:
/// packet.payload_mut().copy_from_slice(&[1, 0, 0, 0, b'x']);
///
/// // Get the full message, from the ICMP header to the end of the payload:
/// assert_eq!(packet.l4().len(), 13);
/// ```
pub struct Packet<'a> {
    buffer: &'a mut [u8],
    l3_protocol: L3,
    payload_end: usize,
}

impl Packet<'_> {
    /// Build a new packet over an existing buffer.
    ///
    /// Panics if the buffer cannot hold the header and the payload.
    pub fn new(buffer: &'_ mut [u8], l3_protocol: L3, payload_size: usize) -> Packet<'_> {
        let payload_end = ICMP_HEADER_SIZE + payload_size;
        assert!(
            buffer.len() >= payload_end,
            "buffer too small for a {} bytes payload",
            payload_size
        );
        buffer[..payload_end].fill(0);
        Packet {
            buffer,
            l3_protocol,
            payload_end,
        }
    }

    /// A slice from the start of the ICMP header to the end of the payload.
    pub fn l4(&self) -> &[u8] {
        &self.buffer[..self.payload_end]
    }

    /// A slice from the start of the payload to the end of the payload.
    pub fn payload(&self) -> &[u8] {
        &self.buffer[ICMP_HEADER_SIZE..self.payload_end]
    }

    /// A mutable slice from the start of the ICMP header to the end of the payload.
    pub fn l4_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[..self.payload_end]
    }

    /// A mutable slice from the start of the payload to the end of the payload.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[ICMP_HEADER_SIZE..self.payload_end]
    }

    /// The layer 3 protocol the message will be sent over.
    pub fn l3_protocol(&self) -> L3 {
        self.l3_protocol
    }

    /// The size of the message from the start of the ICMP header to the end of the payload.
    pub fn l4_size(&self) -> usize {
        self.payload_end
    }
}
