// PCM sample ring shared between the decoder thread and the device callback

use parking_lot::Mutex;
use std::sync::Arc;

struct SampleRing {
    buffer: Vec<f32>,
    write_pos: usize,
    read_pos: usize,
}

impl SampleRing {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(2)],
            write_pos: 0,
            read_pos: 0,
        }
    }

    fn size(&self) -> usize {
        self.buffer.len()
    }

    fn available_write(&self) -> usize {
        self.size() - self.available_read() - 1
    }

    fn available_read(&self) -> usize {
        if self.write_pos >= self.read_pos {
            self.write_pos - self.read_pos
        } else {
            self.size() - (self.read_pos - self.write_pos)
        }
    }

    fn write(&mut self, data: &[f32]) -> usize {
        let to_write = data.len().min(self.available_write());
        let first = to_write.min(self.size() - self.write_pos);
        self.buffer[self.write_pos..self.write_pos + first].copy_from_slice(&data[..first]);
        self.buffer[..to_write - first].copy_from_slice(&data[first..to_write]);
        self.write_pos = (self.write_pos + to_write) % self.size();
        to_write
    }

    fn read(&mut self, output: &mut [f32]) -> usize {
        let to_read = output.len().min(self.available_read());
        let first = to_read.min(self.size() - self.read_pos);
        output[..first].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + first]);
        output[first..to_read].copy_from_slice(&self.buffer[..to_read - first]);
        self.read_pos = (self.read_pos + to_read) % self.size();
        to_read
    }
}

/// Thread-safe handle to a sample ring
#[derive(Clone)]
pub(crate) struct SharedRing {
    inner: Arc<Mutex<SampleRing>>,
}

impl SharedRing {
    pub fn new(size: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SampleRing::new(size))),
        }
    }

    pub fn write(&self, data: &[f32]) -> usize {
        self.inner.lock().write(data)
    }

    pub fn read(&self, output: &mut [f32]) -> usize {
        self.inner.lock().read(output)
    }

    pub fn available_read(&self) -> usize {
        self.inner.lock().available_read()
    }

    pub fn clear(&self) {
        let mut ring = self.inner.lock();
        ring.read_pos = ring.write_pos;
    }
}
