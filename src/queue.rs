/*!
    byte queue filled by the serial interrupt and drained toward the radio

    The producer is an interrupt handler: it can never block nor fail, so a full queue evicts its oldest byte to take the newest. Backpressure is advisory, the host is only told when to continue through [ACK](crate::control::ACK).

    The two control bytes the host sends are not stored, they raise sticky flags instead:

    - [ETX] sets the pause flag, the host waits for an acknowledge. Cleared by [ByteQueue::acknowledge] once there is room again.
    - [EOT] sets the complete flag, the message is finished. Any further byte is refused until the consumer calls [ByteQueue::clear_complete], so the end of a message can never be overwritten by wraparound.
*/

use crate::{
    control::{EOT, ETX, ACK, CHUNK},
    radio::MAX_PAYLOAD,
    };

/// bytes that may still be in flight between a room check and the host seeing the acknowledge
pub const MARGIN: usize = 2;
/// queue size fitting one full radio packet plus one host chunk
pub const QUEUE_SIZE: usize = MAX_PAYLOAD + CHUNK + MARGIN;


/// fixed capacity ring buffer with flow control flags
#[derive(Clone, Debug)]
pub struct ByteQueue<const N: usize> {
    buffer: [u8; N],
    /// index of the oldest byte
    start: usize,
    /// number of bytes currently queued, never above N
    count: usize,
    /// host sent ETX and waits for ACK
    pause: bool,
    /// host sent EOT
    complete: bool,
    /// bytes evicted on overflow since last reset
    dropped: u16,
}

impl<const N: usize> ByteQueue<N> {
    pub const fn new() -> Self {
        Self {
            buffer: [0; N],
            start: 0,
            count: 0,
            pause: false,
            complete: false,
            dropped: 0,
        }
    }

    /// store a byte received from the host, evicting the oldest byte if full
    pub fn enqueue(&mut self, byte: u8) {
        match byte {
            ETX => {self.pause = true; return}
            EOT => {self.complete = true; return}
            // never expected from the host, dropped like any control byte in payload
            ACK => return,
            _ => {},
        }
        if self.complete
            {return}
        if self.count >= N {
            self.start = (self.start + 1) % N;
            self.count -= 1;
            self.dropped = self.dropped.wrapping_add(1);
        }
        self.buffer[(self.start + self.count) % N] = byte;
        self.count += 1;
    }

    /// oldest byte, `None` when empty
    pub fn dequeue(&mut self) -> Option<u8> {
        if self.count == 0
            {return None}
        let byte = self.buffer[self.start];
        self.start = (self.start + 1) % N;
        self.count -= 1;
        Some(byte)
    }

    /// true if a whole host chunk plus the in-flight margin still fits
    pub fn has_room(&self) -> bool {
        N - self.count > CHUNK + MARGIN
    }

    /**
        clear the pause flag if the host is waiting and there is room for its next chunk

        returns true when the caller must send [ACK]
    */
    pub fn acknowledge(&mut self) -> bool {
        if self.pause && self.has_room() {
            self.pause = false;
            true
        }
        else {false}
    }

    pub fn pause_requested(&self) -> bool {self.pause}
    pub fn is_complete(&self) -> bool {self.complete}
    /// accept bytes again after the terminating packet has been framed, the next message starts with no loss counted
    pub fn clear_complete(&mut self) {
        self.complete = false;
        self.dropped = 0;
    }

    pub fn len(&self) -> usize {self.count}
    pub fn is_empty(&self) -> bool {self.count == 0}
    pub const fn capacity(&self) -> usize {N}
    /// number of bytes of the current message lost to overflow
    pub fn dropped(&self) -> u16 {self.dropped}

    /// forget all content and flags
    pub fn reset(&mut self) {
        self.start = 0;
        self.count = 0;
        self.pause = false;
        self.complete = false;
        self.dropped = 0;
    }
}

impl<const N: usize> Default for ByteQueue<N> {
    fn default() -> Self {Self::new()}
}
