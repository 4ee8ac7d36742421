//! Document builders shared by the integration tests.

use dal_engine::Element;

pub fn field(name: &str) -> Element {
    Element::new("FIELD").with_attr("name", name)
}

pub fn param(name: &str, value: &str) -> Element {
    Element::new("PARAM")
        .with_attr("name", name)
        .with_attr("value", value)
}

pub fn info(name: &str, value: &str) -> Element {
    Element::new("INFO")
        .with_attr("name", name)
        .with_attr("value", value)
}

pub fn tabledata(rows: &[&[&str]]) -> Element {
    Element::new("DATA").with_child(
        Element::new("TABLEDATA").with_children(rows.iter().map(|r| Element::tr(r.iter().copied()))),
    )
}

/// VOTABLE > RESOURCE(infos) > TABLE(entries, data).
pub fn votable(infos: Vec<Element>, entries: Vec<Element>, rows: &[&[&str]]) -> Element {
    let table = Element::new("TABLE")
        .with_children(entries)
        .with_child(tabledata(rows));
    Element::new("VOTABLE").with_child(
        Element::new("RESOURCE")
            .with_children(infos)
            .with_child(table),
    )
}

/// ra/dec/mag over two rows, no PARAMs.
pub fn scenario() -> Element {
    votable(
        vec![],
        vec![field("ra"), field("dec"), field("mag")],
        &[&["10.5", "-20.1", "18.2"], &["11.0", "-19.5", "17.9"]],
    )
}

/// Cone search style table: two PARAMs ahead of four FIELDs that carry
/// ID, UCD and utype attributes.
pub fn catalog() -> Element {
    votable(
        vec![info("QUERY_STATUS", "OK"), info("SERVICE", "test-cone")],
        vec![
            param("epoch", "J2000").with_attr("ID", "p_epoch").with_attr("ucd", "time.epoch"),
            param("maxrec", "100").with_attr("ID", "p_maxrec").with_attr("utype", "dal:maxrec"),
            field("obj_id")
                .with_attr("ID", "c_id")
                .with_attr("ucd", "meta.id;meta.main")
                .with_attr("utype", "src:id"),
            field("ra")
                .with_attr("ID", "c_ra")
                .with_attr("ucd", "pos.eq.ra;meta.main")
                .with_attr("utype", "src:ra")
                .with_attr("unit", "deg"),
            field("dec")
                .with_attr("ID", "c_dec")
                .with_attr("ucd", "pos.eq.dec;meta.main")
                .with_attr("utype", "src:dec")
                .with_attr("unit", "deg"),
            field("vmag")
                .with_attr("ID", "c_vmag")
                .with_attr("ucd", "phot.mag;em.opt.V")
                .with_attr("utype", "src:vmag"),
        ],
        &[
            &["NGC 224", "10.684", "41.269", "3.44"],
            &["NGC 598", "23.462", "30.660", "5.72"],
            &["NGC 5194", "202.47", "47.195", ""],
        ],
    )
}

/// Simple Image Access v1 table keyed by UCD.
pub fn image_v1() -> Element {
    votable(
        vec![info("QUERY_STATUS", "OK")],
        vec![
            field("title").with_attr("ucd", "VOX:Image_Title"),
            field("ra").with_attr("ucd", "POS_EQ_RA_MAIN"),
            field("dec").with_attr("ucd", "POS_EQ_DEC_MAIN"),
            field("naxes").with_attr("ucd", "VOX:Image_Naxes"),
            field("format").with_attr("ucd", "VOX:Image_Format"),
            field("url").with_attr("ucd", "VOX:Image_AccessReference"),
        ],
        &[&["M31 B", "10.68", "41.27", "2", "image/fits", "http://dal.test/data/m31.fits"]],
    )
}

/// Image table keyed by ObsCore utypes, with a competing UCD column.
pub fn image_v2() -> Element {
    votable(
        vec![info("QUERY_STATUS", "OK")],
        vec![
            field("obs_title").with_attr("utype", "obscore:DataID.Title"),
            field("legacy_title").with_attr("ucd", "VOX:Image_Title"),
            field("access_url").with_attr("utype", "obscore:Access.Reference"),
        ],
        &[&["ObsCore title", "Legacy title", "http://dal.test/data/x.fits"]],
    )
}

pub fn spectrum() -> Element {
    votable(
        vec![info("QUERY_STATUS", "OK")],
        vec![
            param("format", "application/fits").with_attr("utype", "ssa:Access.Format"),
            field("title").with_attr("utype", "ssa:DataID.Title"),
            field("link").with_attr("ucd", "meta.ref.url"),
        ],
        &[
            &["Spectrum A", "http://dal.test/spec/a"],
            &["Spectrum B", "http://dal.test/spec/b"],
        ],
    )
}

/// A resource reporting a service-side failure.
pub fn query_status_error(message: &str) -> Element {
    votable(
        vec![info("QUERY_STATUS", "ERROR").with_text(message)],
        vec![field("a")],
        &[&["1"]],
    )
}

pub fn to_json(doc: &Element) -> String {
    serde_json::to_string(doc).expect("serialize fixture")
}
