/*!
    state shared between an interrupt handler and the main loop

    Interrupts are not nested and the main loop never blocks inside a mutation, so a short critical section around each access is enough: every call to [Shared::with] is atomic with respect to the interrupt handler.
*/

use core::cell::RefCell;
use critical_section::Mutex;

use crate::queue::{ByteQueue, QUEUE_SIZE};


pub struct Shared<T> {
    value: Mutex<RefCell<T>>,
}

impl<T> Shared<T> {
    pub const fn new(value: T) -> Self {
        Self {value: Mutex::new(RefCell::new(value))}
    }
    /// apply a mutation with interrupts masked
    pub fn with<R>(&self, mutate: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| mutate(&mut self.value.borrow_ref_mut(cs)))
    }
}

/**
    the queue filled by the serial interrupt

    ```ignore
    static QUEUE: SharedQueue = SharedQueue::new(ByteQueue::new());

    fn on_serial_receive(byte: u8) {
        QUEUE.with(|queue| queue.enqueue(byte));
    }
    ```
*/
pub type SharedQueue = Shared<ByteQueue<QUEUE_SIZE>>;
