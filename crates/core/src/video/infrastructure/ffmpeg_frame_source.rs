use std::path::Path;

use crate::shared::collaborator::CollaboratorError;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

/// Decodes frames via ffmpeg-next (libavformat + libavcodec).
///
/// Handles video files as well as anything libavformat can open as a
/// stream (RTSP/HTTP URLs, capture devices). Each decoded picture is
/// converted to RGB24 and wrapped in a [`Frame`].
pub struct FfmpegFrameSource {
    decoding: Option<Decoding>,
    live: bool,
}

struct Decoding {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
    width: u32,
    height: u32,
    frame_index: usize,
    flushing: bool,
    live: bool,
}

// Safety: FfmpegFrameSource is only used from a single thread at a time
// (it is moved into the capture thread and stays there).
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    /// Opens a finite source such as a video file.
    pub fn open(path: &Path) -> Result<Self, CollaboratorError> {
        Self::open_with(path, false)
    }

    /// Opens a real-time source (camera device or network stream). Frames
    /// from a live source may be dropped when processing falls behind, and
    /// the source running dry is an acquisition failure, not end of stream.
    pub fn open_live(path: &Path) -> Result<Self, CollaboratorError> {
        Self::open_with(path, true)
    }

    fn open_with(path: &Path, live: bool) -> Result<Self, CollaboratorError> {
        ffmpeg_next::init()?;

        let input = ffmpeg_next::format::input(path)
            .map_err(|e| format!("failed to open {}: {e}", path.display()))?;
        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let video_stream_index = stream.index();

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

        log::info!(
            "Opened {} source {} ({}x{})",
            if live { "live" } else { "video" },
            path.display(),
            width,
            height
        );

        Ok(Self {
            decoding: Some(Decoding {
                input,
                decoder,
                scaler,
                video_stream_index,
                width,
                height,
                frame_index: 0,
                flushing: false,
                live,
            }),
            live,
        })
    }
}

impl Decoding {
    fn try_receive(&mut self) -> Result<Option<Frame>, CollaboratorError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb_frame)?;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CollaboratorError> {
        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }
        if self.flushing {
            return Ok(None);
        }

        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) if !self.live => {
                    if let Err(e) = self.decoder.send_eof() {
                        log::warn!("Failed to flush decoder: {e}");
                    }
                    self.flushing = true;
                    return self.try_receive();
                }
                Err(ffmpeg_next::Error::Eof) => {
                    return Err(
                        format!("live source ended after {} frames", self.frame_index).into(),
                    );
                }
                Err(ffmpeg_next::Error::Other { errno })
                    if errno == ffmpeg_next::util::error::EAGAIN =>
                {
                    continue;
                }
                Err(e) => {
                    return Err(format!(
                        "frame acquisition failed at frame {}: {e}",
                        self.frame_index
                    )
                    .into());
                }
            }
            if packet.stream() != self.video_stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet: {e}");
                continue;
            }
            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CollaboratorError> {
        match self.decoding.as_mut() {
            Some(decoding) => decoding.next_frame(),
            None => Ok(None),
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn close(&mut self) {
        self.decoding = None;
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// stripping the row padding (stride > width*3).
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
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32) {
        ffmpeg_next::init().unwrap();
        let fps = 25;

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

        for i in 0..num_frames {
            let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let stride = rgb_frame.stride(0);
            let value = ((i * 40) % 256) as u8;
            let data = rgb_frame.data_mut(0);
            for row in 0..height as usize {
                data[row * stride..row * stride + width as usize * 3].fill(value);
            }

            let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb_frame, &mut yuv_frame).unwrap();
            yuv_frame.set_pts(Some(i as i64));
            encoder.send_frame(&yuv_frame).unwrap();
            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                encoded.write_interleaved(&mut octx).unwrap();
            }
        }

        encoder.send_eof().unwrap();
        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
            encoded.write_interleaved(&mut octx).unwrap();
        }
        octx.write_trailer().unwrap();
    }

    fn test_video_path(dir: &Path) -> PathBuf {
        dir.join("test.mp4")
    }

    #[test]
    fn test_yields_all_frames_with_sequential_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 5, 160, 120);

        let mut source = FfmpegFrameSource::open(&path).unwrap();
        let mut frames = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            frames.push(frame);
        }

        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!(frame.channels(), 3);
            assert_eq!(frame.data().len(), 160 * 120 * 3);
        }
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_open_nonexistent_is_error() {
        assert!(FfmpegFrameSource::open(Path::new("/nonexistent/test.mp4")).is_err());
    }

    #[test]
    fn test_live_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 1, 64, 48);

        assert!(!FfmpegFrameSource::open(&path).unwrap().is_live());
        assert!(FfmpegFrameSource::open_live(&path).unwrap().is_live());
    }

    #[test]
    fn test_live_source_running_dry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 3, 64, 48);

        let mut source = FfmpegFrameSource::open_live(&path).unwrap();
        let mut frames = 0;
        let outcome = loop {
            match source.next_frame() {
                Ok(Some(_)) if frames < 10 => frames += 1,
                other => break other,
            }
        };

        assert!(outcome.is_err());
        assert!(frames <= 3);
    }

    #[test]
    fn test_close_ends_stream_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 3, 64, 48);

        let mut source = FfmpegFrameSource::open(&path).unwrap();
        source.close();
        source.close();
        assert!(source.next_frame().unwrap().is_none());
    }
}
