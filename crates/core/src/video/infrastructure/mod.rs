pub mod ffmpeg_frame_source;
pub mod image_file_writer;
pub mod image_frame_source;
