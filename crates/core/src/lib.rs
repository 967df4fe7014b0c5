//! Face detection, tracking and attribute classification over images and
//! videos, producing one result row per detected face.

pub mod shared {
    pub mod bbox;
    pub mod constants;
    pub mod error;
    pub mod frame;
    pub mod frame_id;
    pub mod model_resolver;
    pub mod onnx_session;
    pub mod video_metadata;
}

pub mod video {
    pub mod domain {
        pub mod frame_source;
        pub mod image_writer;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod detection;
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod preprocessing {
    pub mod domain {
        pub mod face_aligner;
        pub mod face_preprocessor;
    }
    pub mod infrastructure;
}

pub mod classification {
    pub mod domain {
        pub mod attributes;
        pub mod face_classifier;
        pub mod result_table;
        pub mod smoothing;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod analyzer_config;
    pub mod face_analyzer;
    pub mod image_analysis_use_case;
    pub mod keyframe_analysis_use_case;
    pub mod pending_batch;
    pub mod pipeline_logger;
    pub mod precomputed_analysis_use_case;
    pub mod tracking_analysis_use_case;
    pub mod video_analysis_use_case;

    #[cfg(test)]
    pub(crate) mod test_support;
}
