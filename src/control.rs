/*!
    out of band bytes of the serial tether

    the tether carries plain text in both directions, a few ascii codes below 0x20 are reserved to delimit messages and pace the host. They never appear as payload: when they show up in text they are dropped, not escaped.
*/

/// end of one complete command (adapter to host) or one complete response (host to adapter)
pub const EOT: u8 = 0x04;
/// sent by the host after each chunk, it then waits for [ACK]
pub const ETX: u8 = 0x03;
/// sent by the adapter to let the host send its next chunk
pub const ACK: u8 = 0x06;

/// number of bytes the host sends toward the adapter before pausing with [ETX]
pub const CHUNK: usize = 16;

/// true for any of the reserved bytes
pub const fn is_control(byte: u8) -> bool {
    matches!(byte, EOT | ETX | ACK)
}
