use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::frame_id::FrameId;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_source::{FrameItem, FrameSource, VideoSourceOptions};

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Converts each selected frame to RGB24 and wraps it in a [`Frame`] whose
/// index is its position in the full decode order, so subsampled and
/// keyframe-only runs still report real frame numbers.
pub struct FfmpegFrameSource {
    path: PathBuf,
    metadata: VideoMetadata,
    options: VideoSourceOptions,
}

impl FfmpegFrameSource {
    /// Probes the video and prepares a source. Decoding starts lazily.
    pub fn open(path: &Path, options: VideoSourceOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let metadata = probe(path)?;
        log::info!(
            "Opened {} ({}x{} @ {:.2} fps, {} frames, codec {})",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames,
            metadata.codec
        );
        Ok(Self {
            path: path.to_path_buf(),
            metadata,
            options,
        })
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn options(&self) -> &VideoSourceOptions {
        &self.options
    }

    /// Frame selection for subsequent calls to `frames`, typically
    /// derived from the probed fps.
    pub fn set_options(&mut self, options: VideoSourceOptions) {
        self.options = options;
    }
}

impl FrameSource for FfmpegFrameSource {
    fn frames(&mut self) -> Box<dyn Iterator<Item = FrameItem> + '_> {
        match FfmpegFrameIter::start(&self.path, self.options.clone(), self.metadata.fps) {
            Ok(iter) => Box::new(iter),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }
}

fn probe(path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
    ffmpeg_next::init()?;

    let ictx = ffmpeg_next::format::input(path)?;
    let stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or("No video stream found")?;

    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
    let decoder = codec_ctx.decoder().video()?;

    Ok(VideoMetadata {
        width: decoder.width(),
        height: decoder.height(),
        fps: rational_to_f64(stream.rate()),
        total_frames: stream.frames() as usize,
        codec: decoder
            .codec()
            .map(|c| c.name().to_string())
            .unwrap_or_default(),
        source_path: Some(path.to_path_buf()),
    })
}

fn rational_to_f64(r: ffmpeg_next::Rational) -> f64 {
    if r.denominator() != 0 {
        r.numerator() as f64 / r.denominator() as f64
    } else {
        0.0
    }
}

/// Lazy iterator that decodes one frame at a time and only converts the
/// frames the options select.
struct FfmpegFrameIter {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    time_base: f64,
    fps: f64,
    options: VideoSourceOptions,
    first_frame: usize,
    decode_index: usize,
    flushing: bool,
    done: bool,
}

impl FfmpegFrameIter {
    fn start(
        path: &Path,
        options: VideoSourceOptions,
        fps: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let video_stream_index = stream.index();
        let time_base = rational_to_f64(stream.time_base());

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let first_frame = options.first_frame(fps);
        if first_frame > 0 {
            log::debug!("Skipping to frame {first_frame}");
        }

        Ok(Self {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
            time_base,
            fps,
            options,
            first_frame,
            decode_index: 0,
            flushing: false,
            done: false,
        })
    }

    /// Frame number of a decoded keyframe, from its timestamp.
    fn keyframe_index(&self, decoded: &ffmpeg_next::util::frame::video::Video) -> Option<usize> {
        timestamp_to_index(decoded.timestamp().or(decoded.pts()), self.time_base, self.fps)
    }

    /// Drains decoded frames until one is selected or the decoder needs input.
    fn receive(&mut self) -> Result<Option<(FrameId, Frame)>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let counter = self.decode_index;
            self.decode_index += 1;

            // Here the counter counts keyframes, not frames.
            let index = if self.options.keyframes_only {
                self.keyframe_index(&decoded).ok_or_else(|| {
                    format!("keyframe #{counter} has no usable timestamp")
                })?
            } else {
                counter
            };
            if !self.options.selects(index, self.first_frame) {
                continue;
            }

            let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
            self.scaler.run(&decoded, &mut rgb_frame)?;
            let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
            let frame = Frame::new(pixels, self.width, self.height, 3, index);
            return Ok(Some((FrameId::Index(index), frame)));
        }
        Ok(None)
    }

    /// Sends the next video packet to the decoder, or EOF when input runs out.
    fn feed(&mut self) {
        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                return;
            };
            if stream.index() != self.video_stream_index {
                continue;
            }
            if self.options.keyframes_only && !packet.is_key() {
                continue;
            }
            if self.decoder.send_packet(&packet).is_ok() {
                return;
            }
        }
    }
}

/// Converts a stream timestamp to a frame number at `fps`.
fn timestamp_to_index(ts: Option<i64>, time_base: f64, fps: f64) -> Option<usize> {
    let ts = ts?;
    if time_base <= 0.0 || fps <= 0.0 || ts < 0 {
        return None;
    }
    Some((ts as f64 * time_base * fps).round() as usize)
}

impl Iterator for FfmpegFrameIter {
    type Item = FrameItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            match self.receive() {
                Ok(Some(item)) => return Some(Ok(item)),
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
            if self.flushing {
                self.done = true;
                return None;
            }
            self.feed();
        }
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
pub(crate) mod test_video {
    use std::path::Path;

    /// Encodes a small MPEG-4 clip whose frame `i` is filled with gray
    /// level `(i * 40) % 256`. A keyframe is forced every `gop` frames.
    pub fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: i32, gop: u32) {
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        encoder_ctx.set_gop(gop);
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        let write_packets = |encoder: &mut ffmpeg_next::encoder::Video,
                                 octx: &mut ffmpeg_next::format::context::Output| {
            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                encoded.write_interleaved(octx).unwrap();
            }
        };

        for i in 0..num_frames {
            let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let stride = rgb_frame.stride(0);
            let data = rgb_frame.data_mut(0);
            let value = ((i * 40) % 256) as u8;
            for row in 0..height as usize {
                let start = row * stride;
                data[start..start + width as usize * 3].fill(value);
            }

            let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb_frame, &mut yuv_frame).unwrap();
            yuv_frame.set_pts(Some(i as i64));

            encoder.send_frame(&yuv_frame).unwrap();
            write_packets(&mut encoder, &mut octx);
        }

        encoder.send_eof().unwrap();
        write_packets(&mut encoder, &mut octx);
        octx.write_trailer().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_video::create_test_video;
    use super::*;
    use crate::video::domain::frame_source::StartUnit;
    use rstest::rstest;

    fn indices(source: &mut FfmpegFrameSource) -> Vec<usize> {
        source
            .frames()
            .map(|item| item.unwrap().0.as_index().unwrap())
            .collect()
    }

    fn video(dir: &Path, frames: usize, gop: u32) -> PathBuf {
        let path = dir.join("test.mp4");
        create_test_video(&path, frames, 160, 120, 25, gop);
        path
    }

    #[test]
    fn test_open_returns_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(dir.path(), 5, 12);

        let source = FfmpegFrameSource::open(&path, VideoSourceOptions::default()).unwrap();
        let meta = source.metadata();
        assert_eq!(meta.width, 160);
        assert_eq!(meta.height, 120);
        assert!(meta.fps > 0.0);
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_nonexistent_is_error() {
        let result = FfmpegFrameSource::open(
            Path::new("/nonexistent/test.mp4"),
            VideoSourceOptions::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_yields_every_frame_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(dir.path(), 6, 12);
        let mut source = FfmpegFrameSource::open(&path, VideoSourceOptions::default()).unwrap();

        assert_eq!(indices(&mut source), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_frames_are_rgb_and_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(dir.path(), 3, 12);
        let mut source = FfmpegFrameSource::open(&path, VideoSourceOptions::default()).unwrap();

        let (id, frame) = source.frames().nth(1).unwrap().unwrap();
        assert_eq!(id, FrameId::Index(1));
        assert_eq!(frame.index(), 1);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.data().len(), 160 * 120 * 3);
    }

    #[test]
    fn test_source_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(dir.path(), 4, 12);
        let mut source = FfmpegFrameSource::open(&path, VideoSourceOptions::default()).unwrap();

        let first = indices(&mut source);
        let second = indices(&mut source);
        assert_eq!(first, second);
    }

    #[test]
    fn test_subsample_keeps_original_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(dir.path(), 7, 12);
        let opts = VideoSourceOptions {
            subsample: 3,
            ..VideoSourceOptions::default()
        };
        let mut source = FfmpegFrameSource::open(&path, opts).unwrap();

        assert_eq!(indices(&mut source), vec![0, 3, 6]);
    }

    #[test]
    fn test_start_in_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(dir.path(), 6, 12);
        let opts = VideoSourceOptions {
            start: 4,
            start_unit: StartUnit::Frames,
            ..VideoSourceOptions::default()
        };
        let mut source = FfmpegFrameSource::open(&path, opts).unwrap();

        assert_eq!(indices(&mut source), vec![4, 5]);
    }

    #[test]
    fn test_start_in_milliseconds() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(dir.path(), 6, 12);
        // 25 fps → 80 ms is frame 2
        let opts = VideoSourceOptions {
            start: 80,
            ..VideoSourceOptions::default()
        };
        let mut source = FfmpegFrameSource::open(&path, opts).unwrap();

        assert_eq!(indices(&mut source), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_keyframes_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(dir.path(), 10, 4);
        let mut source = FfmpegFrameSource::open(&path, VideoSourceOptions::keyframes()).unwrap();

        assert_eq!(indices(&mut source), vec![0, 4, 8]);
    }

    #[rstest]
    #[case::exact(Some(1024), 1.0 / 12800.0, 25.0, Some(2))]
    #[case::rounded(Some(1030), 1.0 / 12800.0, 25.0, Some(2))]
    #[case::missing(None, 1.0 / 12800.0, 25.0, None)]
    #[case::negative(Some(-512), 1.0 / 12800.0, 25.0, None)]
    #[case::no_time_base(Some(1024), 0.0, 25.0, None)]
    fn test_timestamp_to_index(
        #[case] ts: Option<i64>,
        #[case] time_base: f64,
        #[case] fps: f64,
        #[case] expected: Option<usize>,
    ) {
        assert_eq!(timestamp_to_index(ts, time_base, fps), expected);
    }

    #[test]
    fn test_extract_rgb_pixels_strips_padding() {
        let mut frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            3,
            2,
        );
        let stride = frame.stride(0);
        frame.data_mut(0)[stride] = 9; // row 1, col 0, R

        let pixels = extract_rgb_pixels(&frame, 3, 2);
        assert_eq!(pixels.len(), 3 * 2 * 3);
        assert_eq!(pixels[9], 9);
    }
}
