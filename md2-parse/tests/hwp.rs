//! HWP conformance tests on complete documents.

use md2_parse::{HwpEntryStyle, HwpIds, HwpOptions, to_hwp};
use pretty_assertions::assert_eq;

fn entry(name: &str, para_shape: u32, para_style: u32, char_shape: u32) -> HwpEntryStyle {
    HwpEntryStyle {
        entry_name: name.to_string(),
        para_shape,
        para_style,
        char_shape,
    }
}

#[test]
fn picture_between_text_runs() {
    let options = HwpOptions {
        entries: vec![entry("problem_start", 17, 1, 13), entry("default", 2, 3, 4)],
    };
    let mut ids = HwpIds {
        inst_id: 1,
        z_order: 1,
        bin_item: 3,
    };

    let picture = concat!(
        r#"<PICTURE Reverse="false"><SHAPEOBJECT InstId="1" Lock="false" NumberingType="Figure" ZOrder="1">"#,
        r#"<SIZE Height="123" HeightRelTo="Absolute" Protect="false" Width="456" WidthRelTo="Absolute"/>"#,
        r#"<POSITION AffectLSpacing="false" AllowOverlap="false" FlowWithText="true" HoldAnchorAndSO="false" HorzAlign="Left" HorzOffset="0" HorzRelTo="Para" TreatAsChar="true" VertAlign="Top" VertOffset="0" VertRelTo="Para"/>"#,
        r#"<OUTSIDEMARGIN Bottom="0" Left="0" Right="0" Top="0"/><SHAPECOMMENT></SHAPECOMMENT></SHAPEOBJECT>"#,
        r#"<SHAPECOMPONENT CurHeight="123" CurWidth="456" GroupLevel="0" HorzFlip="false" InstID="2" OriHeight="123" OriWidth="456" VertFlip="false" XPos="0" YPos="0">"#,
        r#"<ROTATIONINFO Angle="0" CenterX="228" CenterY="61" Rotate="1"/>"#,
        r#"<RENDERINGINFO><TRANSMATRIX E1="1.00000" E2="0.00000" E3="0.00000" E4="0.00000" E5="1.00000" E6="0.00000"/>"#,
        r#"<SCAMATRIX E1="0.80000" E2="0.00000" E3="0.00000" E4="0.00000" E5="0.80000" E6="0.00000"/>"#,
        r#"<ROTMATRIX E1="1.00000" E2="0.00000" E3="0.00000" E4="0.00000" E5="1.00000" E6="0.00000"/></RENDERINGINFO></SHAPECOMPONENT>"#,
        r#"<IMAGERECT X0="0" X1="456" X2="456" X3="0" Y0="0" Y1="0" Y2="123" Y3="123"/>"#,
        r#"<IMAGECLIP Bottom="123" Left="0" Right="456" Top="0"/>"#,
        r#"<INSIDEMARGIN Bottom="0" Left="0" Right="0" Top="0"/><IMAGEDIM Height="123" Width="456"/>"#,
        r#"<IMAGE Alpha="0" BinItem="3" Bright="0" Contrast="0" Effect="RealPic"/><EFFECTS/></PICTURE>"#,
    );
    let expected = format!(
        concat!(
            r#"<P ParaShape="17" Style="1"><TEXT CharShape="13"><CHAR>a </CHAR></TEXT>"#,
            r#"<TEXT CharShape="0">{}</TEXT><TEXT CharShape="13"><CHAR> </CHAR></TEXT></P>"#,
            r#"<P ParaShape="2" Style="3"><TEXT CharShape="4"><CHAR> b</CHAR></TEXT></P>"#,
        ),
        picture
    );

    assert_eq!(to_hwp("a ![](123,456) \n\n b", &options, &mut ids), expected);
    assert_eq!(ids.bin_item, 4);
    assert_eq!(ids.inst_id, 3);
    assert_eq!(ids.z_order, 2);
}

#[test]
fn ids_continue_across_documents() {
    let options = HwpOptions::default();
    let mut ids = HwpIds::default();
    to_hwp("$$1,2;x$$", &options, &mut ids);
    let second = to_hwp("$$y$$", &options, &mut ids);
    assert!(second.contains(r#"InstId="2""#));
    assert!(second.contains(r#"<SIZE Height="0" HeightRelTo="Absolute" Protect="false" Width="0""#));
    assert_eq!(
        ids,
        HwpIds {
            inst_id: 3,
            z_order: 3,
            bin_item: 1
        }
    );
}

#[test]
fn quote_lines_are_paragraphs() {
    assert_eq!(
        to_hwp("> a\n> b", &HwpOptions::default(), &mut HwpIds::default()),
        r#"<P ParaShape="0" Style="0"><TEXT CharShape="1"><CHAR>a</CHAR></TEXT></P><P ParaShape="0" Style="0"><TEXT CharShape="1"><CHAR>b</CHAR></TEXT></P>"#
    );
}
