//! GDAL-style VRT rendering for mosaic descriptors.
//!
//! A VRT is a small XML document describing a virtual raster as a set of
//! per-band `SimpleSource` windows into other files. GDAL, rasterio and
//! QGIS resolve pixel reads against the referenced files on demand, so the
//! descriptor itself stays kilobytes no matter how large the mosaic is.

use std::fmt::Write;

use super::MosaicDescriptor;

/// Renders the descriptor as VRT XML.
pub fn render(descriptor: &MosaicDescriptor) -> String {
    let mut xml = String::new();

    // Writing to a String cannot fail; unwraps below are infallible.
    writeln!(xml, r#"<?xml version="1.0" encoding="utf-8"?>"#).unwrap();
    writeln!(
        xml,
        r#"<VRTDataset rasterXSize="{}" rasterYSize="{}">"#,
        descriptor.width, descriptor.height
    )
    .unwrap();
    writeln!(xml, "  <SRS>{}</SRS>", escape(&descriptor.crs)).unwrap();
    writeln!(
        xml,
        "  <GeoTransform>{}, {}, 0, {}, 0, {}</GeoTransform>",
        descriptor.bounds.minx, descriptor.pixel_width, descriptor.bounds.maxy, descriptor.pixel_height
    )
    .unwrap();

    for band in &descriptor.bands {
        writeln!(
            xml,
            r#"  <VRTRasterBand dataType="Byte" band="{}">"#,
            band.layer.band_index()
        )
        .unwrap();
        writeln!(xml, "    <Description>{}</Description>", band.layer).unwrap();

        for source in &band.sources {
            writeln!(xml, "    <SimpleSource>").unwrap();
            writeln!(
                xml,
                r#"      <SourceFilename relativeToVRT="0">{}</SourceFilename>"#,
                escape(&source.path.display().to_string())
            )
            .unwrap();
            writeln!(xml, "      <SourceBand>{}</SourceBand>", source.band).unwrap();
            writeln!(
                xml,
                r#"      <SrcRect xOff="{}" yOff="{}" xSize="{}" ySize="{}"/>"#,
                source.src_window.x_off,
                source.src_window.y_off,
                source.src_window.x_size,
                source.src_window.y_size
            )
            .unwrap();
            writeln!(
                xml,
                r#"      <DstRect xOff="{}" yOff="{}" xSize="{}" ySize="{}"/>"#,
                source.dst_window.x_off,
                source.dst_window.y_off,
                source.dst_window.x_size,
                source.dst_window.y_size
            )
            .unwrap();
            writeln!(xml, "    </SimpleSource>").unwrap();
        }

        writeln!(xml, "  </VRTRasterBand>").unwrap();
    }

    writeln!(xml, "</VRTDataset>").unwrap();
    xml
}

/// Minimal XML text escaping for element content.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileBounds;
    use crate::layer::Layer;
    use crate::mosaic::{BandSource, MosaicBand, PixelWindow};
    use std::path::PathBuf;

    fn tiny_descriptor() -> MosaicDescriptor {
        let window = PixelWindow {
            x_off: 0,
            y_off: 0,
            x_size: 100,
            y_size: 100,
        };
        let bands = Layer::ALL
            .iter()
            .map(|&layer| MosaicBand {
                layer,
                sources: vec![BandSource {
                    tile_id: crate::grid::TileId::parse("00N_000E").unwrap(),
                    path: PathBuf::from("/data/stacked_00N_000E.rst"),
                    band: layer.band_index(),
                    src_window: window,
                    dst_window: window,
                }],
            })
            .collect();

        MosaicDescriptor {
            bounds: TileBounds::new(0.0, 0.0, 10.0, 10.0),
            pixel_width: 0.1,
            pixel_height: -0.1,
            width: 100,
            height: 100,
            crs: "EPSG:4326".to_string(),
            bands,
        }
    }

    #[test]
    fn test_render_dataset_dimensions_and_transform() {
        let xml = render(&tiny_descriptor());
        assert!(xml.contains(r#"<VRTDataset rasterXSize="100" rasterYSize="100">"#));
        assert!(xml.contains("<GeoTransform>0, 0.1, 0, 10, 0, -0.1</GeoTransform>"));
        assert!(xml.contains("<SRS>EPSG:4326</SRS>"));
    }

    #[test]
    fn test_render_three_bands_with_descriptions() {
        let xml = render(&tiny_descriptor());
        for (band, name) in [(1, "treecover2000"), (2, "lossyear"), (3, "datamask")] {
            assert!(xml.contains(&format!(r#"<VRTRasterBand dataType="Byte" band="{}">"#, band)));
            assert!(xml.contains(&format!("<Description>{}</Description>", name)));
        }
    }

    #[test]
    fn test_render_source_windows() {
        let xml = render(&tiny_descriptor());
        assert!(xml.contains(r#"<SrcRect xOff="0" yOff="0" xSize="100" ySize="100"/>"#));
        assert!(xml.contains(r#"<DstRect xOff="0" yOff="0" xSize="100" ySize="100"/>"#));
        assert!(xml.contains(r#"<SourceFilename relativeToVRT="0">/data/stacked_00N_000E.rst</SourceFilename>"#));
    }

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(escape("a&b<c>"), "a&amp;b&lt;c&gt;");
    }
}
