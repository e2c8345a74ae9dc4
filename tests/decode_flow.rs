//! Integration test: drive the full decode flow through the public API
//! with pooled surfaces, a worker pool, fit geometry, and batch fan-out.

use std::sync::Once;

use pixelpool::{
    BitmapDecoder, DecodeOptions, DecodePipeline, DecodedFrame, FitMode, PixelError, PixelResult,
    RasterSurface, ResizeOptions, ResizeRect,
};

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Payload format: `[width, height, fill]`, one solid RGBA frame.
struct SolidDecoder;

impl BitmapDecoder for SolidDecoder {
    fn decode(&self, bytes: &[u8]) -> PixelResult<DecodedFrame> {
        let &[width, height, fill] = bytes else {
            return Err(PixelError::decode("expected [width, height, fill]"));
        };
        let (width, height) = (u32::from(width), u32::from(height));
        let pixels = [fill, fill, fill, 255].repeat((width * height) as usize);
        Ok(DecodedFrame::new(width, height, pixels))
    }
}

/// Nearest-neighbour scratch surface backed by a plain byte buffer.
struct ScratchSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ScratchSurface {
    fn new() -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![0; 4],
        }
    }
}

impl RasterSurface for ScratchSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn resize(&mut self, width: u32, height: u32) -> PixelResult<()> {
        self.width = width;
        self.height = height;
        self.pixels = vec![0; (width * height * 4) as usize];
        Ok(())
    }

    fn draw(&mut self, frame: &DecodedFrame, rect: &ResizeRect) -> PixelResult<()> {
        for y in 0..rect.dh {
            let sy = rect.sy + (u64::from(y) * u64::from(rect.sh) / u64::from(rect.dh)) as u32;
            for x in 0..rect.dw {
                let sx = rect.sx + (u64::from(x) * u64::from(rect.sw) / u64::from(rect.dw)) as u32;
                let si = ((sy * frame.width + sx) * 4) as usize;
                let di = (((rect.dy + y) * self.width + rect.dx + x) * 4) as usize;
                self.pixels[di..di + 4].copy_from_slice(&frame.pixels[si..si + 4]);
            }
        }
        Ok(())
    }

    fn read_pixels(&self) -> PixelResult<DecodedFrame> {
        Ok(DecodedFrame::new(
            self.width,
            self.height,
            self.pixels.clone(),
        ))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn full_flow_with_workers_and_surfaces() {
    init_tracing();

    let workers = pixelpool::spawn_worker_pool(pixelpool::WorkerPoolOptions::default(), || {
        |payload: &[u8], resize: Option<&ResizeOptions>| {
            let &[width, height, fill] = payload else {
                return Err("expected [width, height, fill]".to_string());
            };
            let (mut width, mut height) = (u32::from(width), u32::from(height));
            if let Some(resize) = resize {
                let rect = pixelpool::calc_resize_rect(width, height, resize);
                width = rect.dw;
                height = rect.dh;
            }
            let pixels = [fill, fill, fill, 255].repeat((width * height) as usize);
            Ok(DecodedFrame::new(width, height, pixels))
        }
    })
    .expect("worker pool");

    let pipeline = DecodePipeline::builder(SolidDecoder, || Ok(ScratchSurface::new()))
        .expect("pipeline")
        .with_workers(workers);

    // Worker path, cover-resized.
    let frame = pipeline
        .decode(
            &[100, 50, 9],
            DecodeOptions {
                prefer_worker: true,
                resize: Some(ResizeOptions {
                    width: 40,
                    height: 40,
                    fit: FitMode::Cover,
                }),
            },
        )
        .await
        .expect("worker decode");
    assert_eq!((frame.width, frame.height), (40, 40));
    assert!(frame.is_consistent());

    // Surface path, contain-resized: target-sized output with letterbox.
    let frame = pipeline
        .decode(
            &[100, 50, 9],
            DecodeOptions {
                prefer_worker: false,
                resize: Some(ResizeOptions {
                    width: 40,
                    height: 40,
                    fit: FitMode::Contain,
                }),
            },
        )
        .await
        .expect("surface decode");
    assert_eq!((frame.width, frame.height), (40, 40));
    // Top-left corner sits in the letterbox band.
    assert_eq!(&frame.pixels[0..4], &[0, 0, 0, 0]);

    // Batch fan-out stays within the configured concurrency.
    let inputs: Vec<Vec<u8>> = (1..=16).map(|i| vec![8, 8, i]).collect();
    let results = pipeline.decode_batch(&inputs, DecodeOptions::default()).await;
    assert_eq!(results.len(), 16);
    for (i, result) in results.iter().enumerate() {
        let frame = result.as_ref().expect("batch decode");
        assert_eq!(frame.pixels[0] as usize, i + 1);
    }

    pipeline.dispose().await;

    // Disposed pipelines refuse further work that needs a surface.
    let result = pipeline
        .decode(
            &[2, 2, 1],
            DecodeOptions {
                prefer_worker: false,
                resize: Some(ResizeOptions {
                    width: 1,
                    height: 1,
                    fit: FitMode::Cover,
                }),
            },
        )
        .await;
    assert!(matches!(result, Err(PixelError::Pool(_))));
}
