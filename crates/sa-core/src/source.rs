//! Sample source seam
//!
//! The receiver pipeline only needs "a periodic source of integer samples".
//! Synthetic generators and recorded waveforms both implement this trait.

use crate::sample::RawSample;

/// Producer of one raw sample per sender tick
pub trait SampleSource: Send {
    /// Next sample, or `None` once the source is exhausted
    fn next_sample(&mut self) -> Option<RawSample>;

    /// Source name for logging
    fn name(&self) -> &str;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn next_sample(&mut self) -> Option<RawSample> {
        (**self).next_sample()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Adapter turning any sample iterator into a source
pub struct IterSource<I> {
    samples: I,
    name: String,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = RawSample> + Send,
{
    pub fn new(name: &str, samples: I) -> Self {
        Self {
            samples,
            name: name.to_string(),
        }
    }
}

impl<I> SampleSource for IterSource<I>
where
    I: Iterator<Item = RawSample> + Send,
{
    fn next_sample(&mut self) -> Option<RawSample> {
        self.samples.next()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
