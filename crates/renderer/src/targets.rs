//! Ping-pong ownership of the intermediate render targets.
//!
//! The container is generic over the buffer type so the GPU composer
//! (`wgpu` textures) and the software renderer share the same resize rules.

use crate::types::{PipelineError, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Buffers were reallocated at the new size.
    Resized,
    /// Requested size matched the current one; buffers were kept.
    Unchanged,
    /// Zero-sized request; prior buffers and viewport were kept.
    Rejected,
}

#[derive(Debug)]
pub struct PingPong<T> {
    buffers: Vec<T>,
    viewport: Viewport,
}

impl<T> PingPong<T> {
    /// Allocates `count` (at most two) buffers at `viewport`.
    pub fn allocate<F>(count: usize, viewport: Viewport, mut alloc: F) -> Result<Self, PipelineError>
    where
        F: FnMut(usize, Viewport) -> Result<T, PipelineError>,
    {
        let buffers = (0..count.min(2))
            .map(|index| alloc(index, viewport))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { buffers, viewport })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Reallocates every buffer for a new size. On allocation failure the
    /// previous buffers stay in place.
    pub fn resize<F>(
        &mut self,
        width: u32,
        height: u32,
        mut alloc: F,
    ) -> Result<ResizeOutcome, PipelineError>
    where
        F: FnMut(usize, Viewport) -> Result<T, PipelineError>,
    {
        let Some(viewport) = Viewport::new(width, height) else {
            tracing::debug!(width, height, "ignoring zero-sized resize");
            return Ok(ResizeOutcome::Rejected);
        };
        if viewport == self.viewport {
            return Ok(ResizeOutcome::Unchanged);
        }

        let fresh = (0..self.buffers.len())
            .map(|index| alloc(index, viewport))
            .collect::<Result<Vec<_>, _>>()?;
        self.buffers = fresh;
        self.viewport = viewport;
        tracing::debug!(
            width,
            height,
            count = self.buffers.len(),
            "reallocated intermediate buffers"
        );
        Ok(ResizeOutcome::Resized)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.buffers.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.buffers.get_mut(index)
    }

    /// Borrows buffer `read` immutably and buffer `write` mutably.
    pub fn pair_mut(&mut self, read: usize, write: usize) -> Option<(&T, &mut T)> {
        if read == write || read >= self.buffers.len() || write >= self.buffers.len() {
            return None;
        }
        if read < write {
            let (head, tail) = self.buffers.split_at_mut(write);
            Some((&head[read], &mut tail[0]))
        } else {
            let (head, tail) = self.buffers.split_at_mut(read);
            Some((&tail[0], &mut head[write]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(width: u32, height: u32) -> Viewport {
        Viewport::new(width, height).expect("viewport")
    }

    fn sized(_: usize, viewport: Viewport) -> Result<(u32, u32), PipelineError> {
        Ok((viewport.width, viewport.height))
    }

    #[test]
    fn resize_to_same_size_keeps_buffers() {
        let mut targets = PingPong::allocate(2, viewport(640, 480), sized).expect("allocate");
        assert_eq!(targets.resize(800, 600, sized).ok(), Some(ResizeOutcome::Resized));
        let mut calls = 0;
        let outcome = targets
            .resize(800, 600, |index, viewport| {
                calls += 1;
                sized(index, viewport)
            })
            .expect("resize");
        assert_eq!(outcome, ResizeOutcome::Unchanged);
        assert_eq!(calls, 0);
        assert_eq!(targets.get(0), Some(&(800, 600)));
        assert_eq!(targets.get(1), Some(&(800, 600)));
    }

    #[test]
    fn zero_resize_is_rejected_without_changes() {
        let mut targets = PingPong::allocate(2, viewport(640, 480), sized).expect("allocate");
        assert_eq!(targets.resize(0, 480, sized).ok(), Some(ResizeOutcome::Rejected));
        assert_eq!(targets.resize(640, 0, sized).ok(), Some(ResizeOutcome::Rejected));
        assert_eq!(targets.viewport(), viewport(640, 480));
        assert_eq!(targets.get(1), Some(&(640, 480)));
    }

    #[test]
    fn failed_allocation_keeps_previous_buffers() {
        let mut targets = PingPong::allocate(2, viewport(64, 64), sized).expect("allocate");
        let err = targets
            .resize(1 << 20, 64, |_, viewport| {
                Err(PipelineError::BufferAllocation {
                    label: "test".into(),
                    width: viewport.width,
                    height: viewport.height,
                    reason: "too large".into(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::BufferAllocation { .. }));
        assert_eq!(targets.viewport(), viewport(64, 64));
        assert_eq!(targets.get(0), Some(&(64, 64)));
    }

    #[test]
    fn pair_mut_borrows_distinct_buffers() {
        let mut targets =
            PingPong::allocate(2, viewport(4, 4), |index, _| Ok(index)).expect("allocate");
        let (read, write) = targets.pair_mut(1, 0).expect("pair");
        assert_eq!(*read, 1);
        *write = 7;
        assert_eq!(targets.get(0), Some(&7));
        assert!(targets.pair_mut(0, 0).is_none());
    }

    #[test]
    fn allocates_at_most_two_buffers() {
        let targets = PingPong::allocate(5, viewport(4, 4), sized).expect("allocate");
        assert_eq!(targets.len(), 2);
    }
}
