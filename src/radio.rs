/*!
    CC1100 transceiver access and radio packet framing

    The chip itself is reached through the [Transceiver] capability (register read, register write, command strobe), how these are carried on the wire (bit banged SPI or else) and the register initialization table are left to the implementor.

    [Radio] wraps a transceiver with the mode switching sequences the link needs, including the workarounds for the chip errata.

    Packets on air are a [PacketHeader] (length, address) followed by `length - 1` payload bytes. Responses longer than [MAX_PAYLOAD] are sent in several packets, only the [EOT](crate::control::EOT) byte in the last one marks the end.
*/

use bilge::prelude::*;
use packbytes::{FromBytes, ToBytes};
use log::*;


/// largest payload in one packet: 64 bytes FIFO minus length, address and the 2 status bytes appended on reception
pub const MAX_PAYLOAD: usize = 60;
/// address byte put in every packet, receivers do not check it
pub const DEVICE_ADDRESS: u8 = 0x01;

/// header bit selecting burst access, it also distinguishes status registers from strobes
pub const BURST: u8 = 0x40;

/// register addresses used by the link
pub mod register {
    /// TX FIFO when written, RX FIFO when read
    pub const FIFO: u8 = 0x3F;
    /// main radio control state machine state
    pub const MARCSTATE: u8 = 0x35;
    /// current GDOx status and packet status
    pub const PKTSTATUS: u8 = 0x38;
    /// underflow flag and number of bytes in the TX FIFO
    pub const TXBYTES: u8 = 0x3A;
    /// overflow flag and number of bytes in the RX FIFO
    pub const RXBYTES: u8 = 0x3B;
}

/// command strobes
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strobe {
    Reset = 0x30,
    Calibrate = 0x33,
    Rx = 0x34,
    Tx = 0x35,
    Idle = 0x36,
    FlushRx = 0x3A,
    FlushTx = 0x3B,
    Nop = 0x3D,
}

/// state field of the chip status byte
#[bitsize(3)]
#[derive(Copy, Clone, FromBits, Debug, PartialEq)]
pub enum ChipState {
    Idle = 0,
    Rx = 1,
    Tx = 2,
    FastTxReady = 3,
    Calibrate = 4,
    Settling = 5,
    RxOverflow = 6,
    TxUnderflow = 7,
}

/// status byte returned by the chip on every strobe
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct ChipStatus {
    /// bytes free in the TX FIFO or available in the RX FIFO, saturated at 15
    pub fifo_bytes: u4,
    pub state: ChipState,
    /// low once the crystal runs
    pub not_ready: bool,
}

/// content of the MARCSTATE register
#[bitsize(5)]
#[derive(Copy, Clone, FromBits, Debug, PartialEq)]
pub enum MarcState {
    Sleep = 0x00,
    Idle = 0x01,
    Calibrate = 0x08,
    Rx = 0x0D,
    RxEnd = 0x0E,
    RxOverflow = 0x11,
    FsTxOn = 0x12,
    Tx = 0x13,
    TxEnd = 0x14,
    TxUnderflow = 0x16,
    /// any transitional state not listed
    #[fallback]
    Transition = 0x1F,
}

/// content of the RXBYTES and TXBYTES registers
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct FifoStatus {
    pub bytes: u7,
    /// RX overflow or TX underflow
    pub error: bool,
}

/// content of the PKTSTATUS register
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct PacketStatus {
    pub gdo0: bool,
    _reserved: u1,
    pub gdo2: bool,
    pub sync_found: bool,
    pub channel_clear: bool,
    pub preamble_quality: bool,
    pub carrier_sense: bool,
    pub crc_ok: bool,
}

/// first two bytes of a packet on air
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq)]
pub struct PacketHeader {
    /// number of bytes following the length byte: address plus payload
    pub length: u8,
    /// coarse device filter, not checked on reception
    pub address: u8,
}
impl PacketHeader {
    /// header for a packet carrying `payload` bytes, at most [MAX_PAYLOAD]
    pub fn new(payload: usize) -> Self {
        Self {
            length: payload.min(MAX_PAYLOAD) as u8 + 1,
            address: DEVICE_ADDRESS,
        }
    }
    /// number of payload bytes announced
    pub fn payload(&self) -> usize {
        usize::from(self.length.saturating_sub(1))
    }
}


/**
    capability to talk to the transceiver chip

    addresses are the header byte without the read/write bit, status registers are read with [BURST] set
*/
pub trait Transceiver {
    /// read a single register or one byte from the RX FIFO
    fn read_register(&mut self, address: u8) -> u8;
    /// write a single register or one byte to the TX FIFO
    fn write_register(&mut self, address: u8, value: u8);
    /// issue a command strobe and return the chip status byte
    fn strobe(&mut self, strobe: Strobe) -> u8;
    /// level of the pin asserted when a packet was received with a correct CRC, only needed for [RxStrategy::Interrupt](crate::adapter::RxStrategy)
    fn packet_received(&mut self) -> bool {false}
}

/// reads of a status register before giving up waiting for a stable value
const STABLE_READS: usize = 16;
/// chip state polls before giving up waiting for idle
const IDLE_POLLS: usize = 256;


/// mode switching on top of a [Transceiver]
pub struct Radio<T> {
    chip: T,
}

impl<T: Transceiver> Radio<T> {
    pub fn new(chip: T) -> Self {
        Self {chip}
    }
    pub fn chip(&mut self) -> &mut T {&mut self.chip}
    pub fn release(self) -> T {self.chip}

    /// read a status register while it changes, the chip can return torn values otherwise (errata)
    fn status_register(&mut self, address: u8) -> u8 {
        let mut last = self.chip.read_register(address | BURST);
        for _ in 0 .. STABLE_READS {
            let current = self.chip.read_register(address | BURST);
            if current == last
                {break}
            last = current;
        }
        last
    }
    /// chip status byte, read the same way as status registers
    pub fn status(&mut self) -> ChipStatus {
        let mut last = self.chip.strobe(Strobe::Nop);
        for _ in 0 .. STABLE_READS {
            let current = self.chip.strobe(Strobe::Nop);
            if current == last
                {break}
            last = current;
        }
        ChipStatus::from(last)
    }
    pub fn marc_state(&mut self) -> MarcState {
        MarcState::from(u5::new(self.status_register(register::MARCSTATE) & 0x1f))
    }
    pub fn rx_bytes(&mut self) -> FifoStatus {
        FifoStatus::from(self.status_register(register::RXBYTES))
    }
    pub fn tx_bytes(&mut self) -> FifoStatus {
        FifoStatus::from(self.status_register(register::TXBYTES))
    }
    pub fn packet_status(&mut self) -> PacketStatus {
        PacketStatus::from(self.chip.read_register(register::PKTSTATUS | BURST))
    }

    /**
        bring the chip to idle

        returns false if it did not settle in time, the watchdog is then the last resort
    */
    pub fn switch_to_idle(&mut self) -> bool {
        // flushing first gets the chip out of a possible RX overflow
        self.chip.strobe(Strobe::FlushRx);
        self.chip.strobe(Strobe::Idle);
        for _ in 0 .. IDLE_POLLS {
            if self.status().state() == ChipState::Idle
                {return true}
        }
        warn!("radio did not reach idle");
        false
    }
    /// restart reception if the chip is stuck in RX overflow (errata), returns true if it was
    pub fn recover_overflow(&mut self) -> bool {
        if self.marc_state() != MarcState::RxOverflow
            {return false}
        warn!("radio stuck in rx overflow, flushing");
        self.chip.strobe(Strobe::FlushRx);
        self.chip.strobe(Strobe::Rx);
        true
    }
    /// enter reception with an empty RX FIFO
    pub fn start_rx(&mut self) {
        self.recover_overflow();
        self.switch_to_idle();
        self.chip.strobe(Strobe::FlushRx);
        self.chip.strobe(Strobe::Calibrate);
        self.chip.strobe(Strobe::Rx);
    }
    /// send what was written to the TX FIFO
    pub fn start_tx(&mut self) {
        self.recover_overflow();
        self.switch_to_idle();
        self.chip.strobe(Strobe::Calibrate);
        self.chip.strobe(Strobe::Tx);
    }
    /// true once the TX FIFO is empty and the chip stopped transmitting
    pub fn tx_finished(&mut self) -> bool {
        self.tx_bytes().bytes().value() == 0
        && !self.packet_status().gdo2()
    }

    pub fn write_fifo(&mut self, byte: u8) {
        self.chip.write_register(register::FIFO, byte);
    }
    pub fn read_fifo(&mut self) -> u8 {
        self.chip.read_register(register::FIFO)
    }
    pub fn write_header(&mut self, header: PacketHeader) {
        for byte in header.to_be_bytes() {
            self.write_fifo(byte);
        }
    }
    pub fn read_header(&mut self) -> PacketHeader {
        let bytes = [self.read_fifo(), self.read_fifo()];
        PacketHeader::from_be_bytes(bytes)
    }
    /// level of the packet received pin
    pub fn packet_received(&mut self) -> bool {
        self.chip.packet_received()
    }
}
