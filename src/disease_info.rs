// src/disease_info.rs
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Reference card shown under a prediction. Text may contain `*italic*`
/// spans for organism names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiseaseInfo {
    pub cause: &'static str,
    pub symptoms: &'static str,
    pub treatment: &'static str,
}

static DISEASE_INFO: Lazy<HashMap<&'static str, DiseaseInfo>> = Lazy::new(|| {
    HashMap::from([
        (
            "Pepper__bell___Bacterial_spot",
            DiseaseInfo {
                cause: "Bacterium *Xanthomonas campestris pv. vesicatoria*",
                symptoms: "Small, dark, water-soaked spots on leaves which enlarge and cause defoliation.",
                treatment: "Avoid overhead irrigation, use certified seeds, and apply copper-based bactericides.",
            },
        ),
        (
            "Pepper__bell___healthy",
            DiseaseInfo {
                cause: "None – healthy plant",
                symptoms: "Leaves are green, smooth, and free from spots or yellow patches.",
                treatment: "Maintain balanced watering, ensure good air circulation, and check regularly for pests.",
            },
        ),
        (
            "Potato___Early_blight",
            DiseaseInfo {
                cause: "Fungus *Alternaria solani*",
                symptoms: "Dark concentric rings appear on older leaves, leading to yellowing and withering.",
                treatment: "Apply fungicides like Mancozeb or Chlorothalonil and rotate crops annually.",
            },
        ),
        (
            "Potato___Late_blight",
            DiseaseInfo {
                cause: "Oomycete *Phytophthora infestans*",
                symptoms: "Dark brown patches on leaves with white mold underneath, rapid leaf decay.",
                treatment: "Remove affected leaves immediately and apply copper-based fungicides.",
            },
        ),
        (
            "Potato___healthy",
            DiseaseInfo {
                cause: "None – healthy plant",
                symptoms: "Uniform green color, firm leaves without any patches or mold.",
                treatment: "Maintain proper watering, nutrient levels, and pest control.",
            },
        ),
        (
            "Tomato___Bacterial_spot",
            DiseaseInfo {
                cause: "Bacterium *Xanthomonas vesicatoria*",
                symptoms: "Small black spots on leaves and fruits, often with yellow halos.",
                treatment: "Use disease-free seeds, avoid handling wet plants, and use copper-based sprays.",
            },
        ),
        (
            "Tomato___Early_blight",
            DiseaseInfo {
                cause: "Fungus *Alternaria solani*",
                symptoms: "Brown concentric rings on lower leaves, yellowing, and defoliation.",
                treatment: "Remove infected debris, rotate crops, and apply preventive fungicides.",
            },
        ),
        (
            "Tomato___Late_blight",
            DiseaseInfo {
                cause: "Pathogen *Phytophthora infestans*",
                symptoms: "Dark, water-soaked lesions on leaves and stems, often spreading quickly.",
                treatment: "Destroy infected plants and apply metalaxyl-based fungicides promptly.",
            },
        ),
        (
            "Tomato___Leaf_Mold",
            DiseaseInfo {
                cause: "Fungus *Passalora fulva*",
                symptoms: "Yellow patches on upper leaf surfaces and olive-green mold underneath.",
                treatment: "Improve ventilation, avoid overhead watering, and apply sulfur-based fungicides.",
            },
        ),
        (
            "Tomato___healthy",
            DiseaseInfo {
                cause: "None – healthy plant",
                symptoms: "Leaves are smooth and vibrant green without discoloration or mold.",
                treatment: "Continue normal watering and sunlight exposure; keep monitoring regularly.",
            },
        ),
    ])
});

pub fn lookup(label: &str) -> Option<&'static DiseaseInfo> {
    DISEASE_INFO.get(label)
}
