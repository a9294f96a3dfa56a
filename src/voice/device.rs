//! Stream configuration for the local audio devices

use cpal::{SampleFormat, SampleRate, StreamConfig, SupportedStreamConfigRange};

/// Choose a stream config at `sample_rate`
///
/// Channel counts are tried in `channels` order. Within a channel count an
/// `f32` range wins over other sample formats, since the stream callbacks work
/// on `f32` samples.
pub(super) fn choose_config<I>(
    ranges: I,
    sample_rate: u32,
    channels: &[u16],
) -> Option<StreamConfig>
where
    I: IntoIterator<Item = SupportedStreamConfigRange>,
{
    let rate = SampleRate(sample_rate);
    let usable: Vec<SupportedStreamConfigRange> = ranges
        .into_iter()
        .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .collect();

    channels.iter().find_map(|&count| {
        let mut matching = usable.iter().filter(|range| range.channels() == count);
        let preferred = matching
            .clone()
            .find(|range| range.sample_format() == SampleFormat::F32)
            .or_else(|| matching.next())?;
        Some(preferred.clone().with_sample_rate(rate).config())
    })
}

#[cfg(test)]
mod tests {
    use cpal::SupportedBufferSize;

    use super::*;

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn test_prefers_channel_order() {
        let ranges = vec![
            range(2, 8_000, 48_000, SampleFormat::F32),
            range(1, 8_000, 48_000, SampleFormat::F32),
        ];

        let config = choose_config(ranges, 24_000, &[1, 2]).unwrap();
        assert_eq!(config.channels, 1);
        assert_eq!(config.sample_rate, SampleRate(24_000));
    }

    #[test]
    fn test_falls_back_to_stereo() {
        let ranges = vec![
            range(1, 44_100, 48_000, SampleFormat::F32),
            range(2, 8_000, 48_000, SampleFormat::I16),
        ];

        let config = choose_config(ranges, 24_000, &[1, 2]).unwrap();
        assert_eq!(config.channels, 2);
    }

    #[test]
    fn test_prefers_f32_within_channel_count() {
        let ranges = vec![
            range(1, 8_000, 48_000, SampleFormat::I16),
            range(1, 16_000, 16_000, SampleFormat::F32),
        ];

        let config = choose_config(ranges.clone(), 16_000, &[1]).unwrap();
        assert_eq!(config.sample_rate, SampleRate(16_000));
        assert!(choose_config(ranges, 96_000, &[1]).is_none());
    }
}
